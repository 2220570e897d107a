// src/lib.rs
//
// Calculatrice à réels constructifs : bibliothèque
// ------------------------------------------------
// - reel       : réels calculables (approximation à la demande, formes exactes)
// - expression : jetons de saisie, RPN, arbre, évaluation
// - moteur     : fiches, stock SQLite, tâches de fond, précision d’affichage
// - config     : délais, plafonds, marges
// - erreur     : taxonomie des erreurs

pub mod config;
pub mod erreur;
pub mod expression;
pub mod moteur;
pub mod reel;
