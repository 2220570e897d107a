//! src/moteur/mod.rs
//!
//! Moteur d’évaluation : fiches d’expressions, stock durable, planificateur des tâches
//! de fond et politique de précision d’affichage.

pub(crate) mod calcul;
pub mod ecouteur;
pub mod evaluateur;
pub mod fiche;
pub mod precision;
pub mod stock;
pub mod table;

#[cfg(test)]
mod tests_moteur;

pub use ecouteur::{ChiffreFaible, Ecouteur, LargeurAffichage, LargeurFixe, SeparateursMilliers, TypeErreur};
pub use evaluateur::Evaluateur;
pub use fiche::Fiche;
pub use stock::{StockDurable, StockSqlite};
pub use table::{INDEX_COURANT, INDEX_MIROIR};
