// src/reel/annulation.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::erreur::ErreurCalcul;

/// Jeton d’annulation coopérative, partagé entre le planificateur et une tâche de fond.
/// Les boucles longues appellent `verifie()` et remontent `ErreurCalcul::Annule`.
#[derive(Clone, Debug, Default)]
pub struct Annulation(Arc<AtomicBool>);

impl Annulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annule(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn est_annulee(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn verifie(&self) -> Result<(), ErreurCalcul> {
        if self.est_annulee() {
            Err(ErreurCalcul::Annule)
        } else {
            Ok(())
        }
    }
}
