// src/reel/trig_exacte.rs
//
// sin, cos et tan exacts pour les multiples de π/6 et π/4.
// L’argument est connu sous la forme k·π (Forme::MultiplePi) ; on le ramène en
// douzièmes de π, puis au premier quadrant par symétrie. Les valeurs 0, ±1/2, ±1
// restent rationnelles ; √2/2, √3/2, √3/3 et √3 passent par la racine carrée.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::ToPrimitive;

use super::Reel;

#[derive(Clone, Copy, Debug)]
pub(crate) enum Circulaire {
    Sin,
    Cos,
    Tan,
}

#[derive(Clone, Debug)]
pub(crate) enum Speciale {
    Valeur(Reel),
    /// tan(π/2 + kπ)
    Indefini,
}

/// Valeur exacte au signe près.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Exacte {
    Rationnel(i64, i64),
    /// √m / d
    Racine(i64, i64),
}

impl Exacte {
    fn reel(self, negatif: bool) -> Reel {
        let signe = if negatif { -1 } else { 1 };
        match self {
            Exacte::Rationnel(n, d) => Reel::rationnel(BigRational::new(
                BigInt::from(signe * n),
                BigInt::from(d),
            )),
            Exacte::Racine(m, d) => Reel::entier(m).racine_non_negative().mul(&Reel::rationnel(
                BigRational::new(BigInt::from(signe), BigInt::from(d)),
            )),
        }
    }
}

/// sin(j·π/12) pour 0 ≤ j ≤ 6.
fn sinus_quadrant(j: i64) -> Option<Exacte> {
    match j {
        0 => Some(Exacte::Rationnel(0, 1)),
        2 => Some(Exacte::Rationnel(1, 2)),
        3 => Some(Exacte::Racine(2, 2)),
        4 => Some(Exacte::Racine(3, 2)),
        6 => Some(Exacte::Rationnel(1, 1)),
        _ => None,
    }
}

/// tan(j·π/12) pour 0 ≤ j < 6.
fn tangente_quadrant(j: i64) -> Option<Exacte> {
    match j {
        0 => Some(Exacte::Rationnel(0, 1)),
        2 => Some(Exacte::Racine(3, 3)),
        3 => Some(Exacte::Rationnel(1, 1)),
        4 => Some(Exacte::Racine(3, 1)),
        _ => None,
    }
}

/// sin(j·π/12), j dans [0, 24).
fn sinus(j: i64) -> Option<Speciale> {
    let (j, negatif) = if j >= 12 { (j - 12, true) } else { (j, false) };
    let j = if j > 6 { 12 - j } else { j };
    sinus_quadrant(j).map(|v| Speciale::Valeur(v.reel(negatif)))
}

/// tan(j·π/12), j dans [0, 24).
fn tangente(j: i64) -> Option<Speciale> {
    let j = j % 12;
    match j {
        6 => Some(Speciale::Indefini),
        j if j > 6 => tangente_quadrant(12 - j).map(|v| Speciale::Valeur(v.reel(true))),
        j => tangente_quadrant(j).map(|v| Speciale::Valeur(v.reel(false))),
    }
}

/// Reconnaît f(k·π) ; `None` quand k n’est pas un multiple de π/12 de la table.
pub(crate) fn valeur_speciale(k: &BigRational, f: Circulaire) -> Option<Speciale> {
    let douziemes = k * BigRational::from_integer(BigInt::from(12));
    if !douziemes.is_integer() {
        return None;
    }
    let j: BigInt = ((douziemes.to_integer() % 24) + 24) % 24;
    let j = j.to_i64()?;
    match f {
        Circulaire::Sin => sinus(j),
        Circulaire::Cos => sinus((j + 6) % 24),
        Circulaire::Tan => tangente(j),
    }
}
