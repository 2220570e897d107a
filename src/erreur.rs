// src/erreur.rs
//
// Taxonomie des erreurs du noyau.
// - ErreurCalcul : tout ce qu’une évaluation peut rencontrer (remonte jusqu’à la tâche de fond)
// - ErreurStock  : stock durable (SQLite, sérialisation)
// - ErreurInterne : invariant violé (le planificateur la traite comme fatale)

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErreurCalcul {
    /// Expression mal formée.
    #[error("erreur de syntaxe : {0}")]
    Syntaxe(String),

    /// Division par zéro, argument hors domaine, valeur non définie.
    #[error("erreur de domaine : {0}")]
    Domaine(String),

    /// Une borne interne sur la précision de travail a été franchie.
    #[error("précision de travail hors limites")]
    DepassementPrecision,

    /// Annulation coopérative observée en plein calcul.
    #[error("calcul annulé")]
    Annule,
}

#[derive(Debug, Error)]
pub enum ErreurStock {
    #[error("base SQLite : {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("sérialisation : {0}")]
    Serde(#[from] serde_json::Error),

    #[error("aucune expression à l’index {0}")]
    IndexInconnu(i64),

    #[error("écriture différée échouée : {0}")]
    EcritureEchouee(String),

    #[error("fil d’écriture arrêté")]
    EcrivainArrete,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErreurInterne {
    #[error("la nouvelle approximation contredit l’ancienne : {ancien:?} -> {nouveau:?}")]
    ApproximationContradictoire { ancien: String, nouveau: String },

    #[error("précision en recul : {ancien} -> {nouveau}")]
    PrecisionEnRecul { ancien: i32, nouveau: i32 },

    #[error("chaîne de chiffres illisible : {0:?}")]
    ChaineIllisible(String),
}
