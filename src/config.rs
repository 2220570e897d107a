//! src/config.rs
//!
//! Réglages du moteur d’évaluation.
//!
//! Rôle : regrouper délais, plafonds de bits et marges de précision en un seul
//! endroit, avec des bornes (garde-fous) appliquées par `bornee()`.

use std::time::Duration;

/// Précision initiale (chiffres après la virgule) d’une première évaluation.
pub const PRECISION_INITIALE: i32 = 50;

/// Plafond de la recherche du premier chiffre significatif (chiffres).
pub const OFFSET_MSD_MAX: i32 = 1100;

/// Délai d’une évaluation facultative (pendant la saisie).
pub const DELAI_FACULTATIF: Duration = Duration::from_secs(1);
/// Délai d’une évaluation demandée par "=".
pub const DELAI_COURT: Duration = Duration::from_secs(2);
/// Délai après "utiliser un délai plus long".
pub const DELAI_LONG: Duration = Duration::from_secs(15);
/// Réévaluation d’une fiche d’historique déjà évaluée avec succès.
pub const DELAI_HISTORIQUE: Duration = Duration::from_secs(60);

/// Plafonds de taille de la partie entière (bits) avant conversion décimale.
pub const BITS_MAX_FACULTATIF: u64 = 50_000;
pub const BITS_MAX_COURT: u64 = 150_000;
pub const BITS_MAX_LONG: u64 = 350_000;

/// Marge additive d’un raffinement (chiffres).
pub const MARGE_RAFFINEMENT: i32 = 30;
/// Marge proportionnelle : longueur de la chaîne en cache divisée par ce diviseur.
pub const DIVISEUR_MARGE: i32 = 5;

/// Garde-fous.
const PRECISION_MAX: i32 = 10_000;
const DELAI_MAX: Duration = Duration::from_secs(600);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigMoteur {
    pub precision_initiale: i32,
    pub offset_msd_max: i32,

    pub delai_facultatif: Duration,
    pub delai_court: Duration,
    pub delai_long: Duration,
    pub delai_historique: Duration,

    pub bits_max_facultatif: u64,
    pub bits_max_court: u64,
    pub bits_max_long: u64,

    pub marge_raffinement: i32,
    pub diviseur_marge: i32,
}

impl Default for ConfigMoteur {
    fn default() -> Self {
        Self {
            precision_initiale: PRECISION_INITIALE,
            offset_msd_max: OFFSET_MSD_MAX,
            delai_facultatif: DELAI_FACULTATIF,
            delai_court: DELAI_COURT,
            delai_long: DELAI_LONG,
            delai_historique: DELAI_HISTORIQUE,
            bits_max_facultatif: BITS_MAX_FACULTATIF,
            bits_max_court: BITS_MAX_COURT,
            bits_max_long: BITS_MAX_LONG,
            marge_raffinement: MARGE_RAFFINEMENT,
            diviseur_marge: DIVISEUR_MARGE,
        }
    }
}

impl ConfigMoteur {
    /// Ramène chaque réglage dans un intervalle raisonnable (anti-gel).
    pub fn bornee(mut self) -> Self {
        self.precision_initiale = self.precision_initiale.clamp(1, PRECISION_MAX);
        self.offset_msd_max = self.offset_msd_max.clamp(self.precision_initiale, PRECISION_MAX);

        let delai = |d: Duration| d.clamp(Duration::from_millis(10), DELAI_MAX);
        self.delai_facultatif = delai(self.delai_facultatif);
        self.delai_court = delai(self.delai_court);
        self.delai_long = delai(self.delai_long).max(self.delai_court);
        self.delai_historique = delai(self.delai_historique);

        self.bits_max_facultatif = self.bits_max_facultatif.max(64);
        self.bits_max_court = self.bits_max_court.max(self.bits_max_facultatif);
        self.bits_max_long = self.bits_max_long.max(self.bits_max_court);

        self.marge_raffinement = self.marge_raffinement.clamp(0, PRECISION_MAX);
        self.diviseur_marge = self.diviseur_marge.max(1);
        self
    }

    /// Délai et plafond de bits d’une évaluation initiale.
    pub fn budget(&self, requise: bool, delai_long: bool) -> (Duration, u64) {
        match (requise, delai_long) {
            (_, true) => (self.delai_long, self.bits_max_long),
            (true, false) => (self.delai_court, self.bits_max_court),
            (false, false) => (self.delai_facultatif, self.bits_max_facultatif),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bornes_appliquees() {
        let c = ConfigMoteur {
            precision_initiale: -3,
            offset_msd_max: 0,
            delai_facultatif: Duration::ZERO,
            delai_long: Duration::from_millis(20),
            bits_max_long: 1,
            diviseur_marge: 0,
            ..ConfigMoteur::default()
        }
        .bornee();
        assert_eq!(c.precision_initiale, 1);
        assert_eq!(c.offset_msd_max, 1);
        assert_eq!(c.delai_facultatif, Duration::from_millis(10));
        assert_eq!(c.delai_long, DELAI_COURT);
        assert_eq!(c.bits_max_long, BITS_MAX_COURT);
        assert_eq!(c.diviseur_marge, 1);
        assert_eq!(ConfigMoteur::default().bornee(), ConfigMoteur::default());
    }

    #[test]
    fn budget_selon_la_requete() {
        let c = ConfigMoteur::default();
        assert_eq!(c.budget(false, false), (DELAI_FACULTATIF, BITS_MAX_FACULTATIF));
        assert_eq!(c.budget(true, false), (DELAI_COURT, BITS_MAX_COURT));
        assert_eq!(c.budget(true, true), (DELAI_LONG, BITS_MAX_LONG));
    }
}
