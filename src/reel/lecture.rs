// src/reel/lecture.rs
//
// Lecture décimale d’un entier mis à l’échelle, et π par la formule de Machin.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use super::{echelle, Annulation, Approximation};
use crate::erreur::ErreurCalcul;

pub(crate) fn pow10(n: usize) -> BigInt {
    BigInt::from(10u32).pow(n as u32)
}

/// Écrit `n·10^-chiffres` en décimal.
/// Le signe survit à une partie entière nulle (`-0.25`).
pub fn decimal_echelonne(n: &BigInt, chiffres: usize) -> String {
    let mut texte = n.magnitude().to_str_radix(10);
    if texte.len() <= chiffres {
        let manque = chiffres + 1 - texte.len();
        texte.insert_str(0, &"0".repeat(manque));
    }
    if chiffres > 0 {
        texte.insert(texte.len() - chiffres, '.');
    }
    if n.is_negative() {
        texte.insert(0, '-');
    }
    texte
}

/// Bits de garde : l’erreur de troncature cumulée reste < 2^31 jusqu’à |p| = 2^28.
const GARDE_PI: i32 = 32;

/// ⌊unite·atan(1/q)⌋ à un nombre de termes près : Σ (-1)^k · unite / ((2k+1)·q^(2k+1)).
fn arctan_inverse(q: u32, unite: &BigInt, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
    let q2 = BigInt::from(q) * q;
    // ⌊unite / q^(2k+1)⌋ : diviser un plancher par un entier reste exact
    let mut puissance = unite / q;
    let mut somme = BigInt::zero();
    let mut k: u64 = 0;

    while !puissance.is_zero() {
        let terme = &puissance / (2 * k + 1);
        if k % 2 == 0 {
            somme += terme;
        } else {
            somme -= terme;
        }
        puissance /= &q2;
        k += 1;
        if k % 64 == 0 {
            annul.verifie()?;
        }
    }
    Ok(somme)
}

/// π = 16·atan(1/5) − 4·atan(1/239).
pub(crate) struct PiMachin;

impl Approximation for PiMachin {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        if p >= 2 {
            return Ok(BigInt::zero());
        }
        let unite = BigInt::from(1) << ((GARDE_PI - p) as usize);
        let a = arctan_inverse(5, &unite, annul)?;
        let b = arctan_inverse(239, &unite, annul)?;
        Ok(echelle(&(a * 16 - b * 4), -GARDE_PI))
    }
}
