// src/reel/base.rs
//
// Nœuds arithmétiques : constantes rationnelles, +, −, ×, 1/x, décalage, |x|.
// Les constructeurs court-circuitent vers une forme exacte dès que possible.

use std::sync::OnceLock;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use super::lecture::PiMachin;
use super::{echelle, longueur_bits, Annulation, Approximation, Forme, Reel};
use crate::erreur::ErreurCalcul;

/* ------------------------ Nœuds ------------------------ */

/// Division entière arrondie au plus proche ; `den > 0`.
fn division_arrondie(num: &BigInt, den: &BigInt) -> BigInt {
    let m = num.abs();
    let q: BigInt = (m * 2 + den) / (den * 2);
    if num.is_negative() {
        -q
    } else {
        q
    }
}

struct Constante(BigRational);

impl Approximation for Constante {
    fn approxime(&self, p: i32, _annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        // |q| < 2^(bits(num) − bits(den) + 1) : sous 2^(p−1), l’arrondi vaut 0
        let ordre = self.0.numer().bits() as i64 - self.0.denom().bits() as i64 + 2;
        if i64::from(p) >= ordre {
            return Ok(BigInt::zero());
        }
        let (num, den) = if p <= 0 {
            (self.0.numer() << ((-p) as usize), self.0.denom().clone())
        } else {
            (self.0.numer().clone(), self.0.denom() << (p as usize))
        };
        Ok(division_arrondie(&num, &den))
    }
}

struct Oppose(Reel);

impl Approximation for Oppose {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        Ok(-self.0.appr(p, annul)?)
    }
}

struct Somme(Reel, Reel);

impl Approximation for Somme {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        let a = self.0.appr(p - 2, annul)?;
        let b = self.1.appr(p - 2, annul)?;
        Ok(echelle(&(a + b), -2))
    }
}

struct Produit(Reel, Reel);

impl Approximation for Produit {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        let demi = (p >> 1) - 1;
        let (mut op1, mut op2) = (&self.0, &self.1);

        let msd1 = match op1.msd_a(demi, annul)? {
            Some(m) => m,
            None => match op2.msd_a(demi, annul)? {
                // les deux facteurs sont < 2^demi : le produit est sous 2^p
                None => return Ok(BigInt::zero()),
                Some(m) => {
                    std::mem::swap(&mut op1, &mut op2);
                    m
                }
            },
        };

        let prec2 = p - msd1 - 3;
        let appr2 = op2.appr(prec2, annul)?;
        if appr2.is_zero() {
            return Ok(BigInt::zero());
        }
        let msd2 = prec2 + longueur_bits(&appr2) - 1;
        let prec1 = p - msd2 - 3;
        let appr1 = op1.appr(prec1, annul)?;

        Ok(echelle(&(appr1 * appr2), prec1 + prec2 - p))
    }
}

struct Inverse(Reel);

impl Approximation for Inverse {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        // boucle sur un opérande nul jusqu’au dépassement (ou l’annulation)
        let msd = self.0.msd(annul)?;
        let inv_msd = 1 - msd;
        let chiffres = inv_msd - p + 3;
        let prec = msd - chiffres;
        let log_facteur = -p - prec;
        if log_facteur < 0 {
            return Ok(BigInt::zero());
        }

        let dividende = BigInt::one() << (log_facteur as usize);
        let diviseur = self.0.appr(prec, annul)?;
        if diviseur.is_zero() {
            return Err(ErreurCalcul::DepassementPrecision);
        }
        let diviseur_abs = diviseur.abs();
        let ajuste = &dividende + (&diviseur_abs >> 1usize);
        let resultat = ajuste / &diviseur_abs;
        Ok(if diviseur.is_negative() {
            -resultat
        } else {
            resultat
        })
    }
}

struct Decale(Reel, i32);

impl Approximation for Decale {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        self.0.appr(p - self.1, annul)
    }
}

struct ValeurAbsolue(Reel);

impl Approximation for ValeurAbsolue {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        Ok(self.0.appr(p, annul)?.abs())
    }
}

/* ------------------------ Constructeurs ------------------------ */

static PI: OnceLock<Reel> = OnceLock::new();

fn pi_brut() -> Reel {
    PI.get_or_init(|| Reel::nouveau(PiMachin, Forme::MultiplePi(BigRational::one())))
        .clone()
}

fn puissance_de_deux(n: i32) -> BigRational {
    let p = BigInt::one() << (n.unsigned_abs() as usize);
    if n >= 0 {
        BigRational::from_integer(p)
    } else {
        BigRational::new(BigInt::one(), p)
    }
}

impl Reel {
    pub fn rationnel(q: BigRational) -> Reel {
        Reel::nouveau(Constante(q.clone()), Forme::Rationnel(q))
    }

    pub fn entier(n: impl Into<BigInt>) -> Reel {
        Reel::rationnel(BigRational::from_integer(n.into()))
    }

    pub fn zero() -> Reel {
        Reel::entier(0)
    }

    pub fn un() -> Reel {
        Reel::entier(1)
    }

    /// π, partagé par tout le processus (son memo sert tous les calculs).
    pub fn pi() -> Reel {
        pi_brut()
    }

    /// k·π ; exact quand k = 0.
    pub fn multiple_pi(k: BigRational) -> Reel {
        if k.is_zero() {
            return Reel::zero();
        }
        if k.is_one() {
            return pi_brut();
        }
        let facteur = Reel::rationnel(k.clone());
        Reel::nouveau(Produit(pi_brut(), facteur), Forme::MultiplePi(k))
    }

    pub fn neg(&self) -> Reel {
        match self.forme() {
            Forme::Rationnel(q) => Reel::rationnel(-q),
            Forme::MultiplePi(k) => Reel::multiple_pi(-k),
            Forme::Quelconque => Reel::nouveau(Oppose(self.clone()), Forme::Quelconque),
        }
    }

    pub fn add(&self, autre: &Reel) -> Reel {
        match (self.forme(), autre.forme()) {
            (Forme::Rationnel(a), Forme::Rationnel(b)) => Reel::rationnel(a + b),
            (Forme::MultiplePi(a), Forme::MultiplePi(b)) => Reel::multiple_pi(a + b),
            (Forme::Rationnel(a), _) if a.is_zero() => autre.clone(),
            (_, Forme::Rationnel(b)) if b.is_zero() => self.clone(),
            _ => Reel::nouveau(Somme(self.clone(), autre.clone()), Forme::Quelconque),
        }
    }

    pub fn sub(&self, autre: &Reel) -> Reel {
        self.add(&autre.neg())
    }

    pub fn mul(&self, autre: &Reel) -> Reel {
        match (self.forme(), autre.forme()) {
            (Forme::Rationnel(a), Forme::Rationnel(b)) => Reel::rationnel(a * b),
            (Forme::Rationnel(a), _) | (_, Forme::Rationnel(a)) if a.is_zero() => Reel::zero(),
            (Forme::Rationnel(a), _) if a.is_one() => autre.clone(),
            (_, Forme::Rationnel(b)) if b.is_one() => self.clone(),
            (Forme::Rationnel(q), Forme::MultiplePi(k)) | (Forme::MultiplePi(k), Forme::Rationnel(q)) => {
                Reel::multiple_pi(q * k)
            }
            _ => Reel::nouveau(Produit(self.clone(), autre.clone()), Forme::Quelconque),
        }
    }

    /// 1/x ; un zéro reconnu est une erreur de domaine.
    pub fn inverse(&self) -> Result<Reel, ErreurCalcul> {
        match self.forme() {
            Forme::Rationnel(q) if q.is_zero() => {
                Err(ErreurCalcul::Domaine("division par zéro".into()))
            }
            Forme::Rationnel(q) => Ok(Reel::rationnel(q.recip())),
            _ => Ok(self.inverse_non_nul()),
        }
    }

    /// 1/x sans contrôle : un zéro non reconnu boucle jusqu’au dépassement de précision.
    pub(crate) fn inverse_non_nul(&self) -> Reel {
        Reel::nouveau(Inverse(self.clone()), Forme::Quelconque)
    }

    pub fn div(&self, autre: &Reel) -> Result<Reel, ErreurCalcul> {
        match (self.forme(), autre.forme()) {
            (Forme::MultiplePi(a), Forme::MultiplePi(b)) => Ok(Reel::rationnel(a / b)),
            (Forme::MultiplePi(k), Forme::Rationnel(q)) if !q.is_zero() => {
                Ok(Reel::multiple_pi(k / q))
            }
            _ => Ok(self.mul(&autre.inverse()?)),
        }
    }

    /// x·2^n
    pub fn decale(&self, n: i32) -> Reel {
        if n == 0 {
            return self.clone();
        }
        match self.forme() {
            Forme::Rationnel(q) => Reel::rationnel(q * puissance_de_deux(n)),
            Forme::MultiplePi(k) => Reel::multiple_pi(k * puissance_de_deux(n)),
            Forme::Quelconque => Reel::nouveau(Decale(self.clone(), n), Forme::Quelconque),
        }
    }

    pub fn abs(&self) -> Reel {
        match self.forme() {
            Forme::Rationnel(q) => Reel::rationnel(q.abs()),
            Forme::MultiplePi(k) => Reel::multiple_pi(k.abs()),
            Forme::Quelconque => Reel::nouveau(ValeurAbsolue(self.clone()), Forme::Quelconque),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reel::Forme;

    fn r(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn formes_exactes_propagees() {
        let a = Reel::rationnel(r(1, 3));
        let b = Reel::rationnel(r(1, 6));
        assert_eq!(a.add(&b).forme(), &Forme::Rationnel(r(1, 2)));
        assert_eq!(a.mul(&b).forme(), &Forme::Rationnel(r(1, 18)));
        assert_eq!(a.decale(3).forme(), &Forme::Rationnel(r(8, 3)));

        let pi_sur_2 = Reel::pi().decale(-1);
        assert_eq!(pi_sur_2.forme(), &Forme::MultiplePi(r(1, 2)));
        let s = pi_sur_2.add(&Reel::pi());
        assert_eq!(s.forme(), &Forme::MultiplePi(r(3, 2)));
        assert_eq!(
            s.div(&Reel::pi()).unwrap().forme(),
            &Forme::Rationnel(r(3, 2))
        );
        assert!(Reel::pi().sub(&Reel::pi()).est_zero_certain());
    }

    #[test]
    fn division_par_zero_reconnue() {
        assert!(matches!(
            Reel::un().div(&Reel::zero()),
            Err(ErreurCalcul::Domaine(_))
        ));
    }

    #[test]
    fn operations_generales() {
        let annul = Annulation::new();
        let e = Reel::un().exp();
        // (e + π) · (e − π) = e² − π²
        let gauche = e.add(&Reel::pi()).mul(&e.sub(&Reel::pi()));
        let droite = e.mul(&e).sub(&Reel::pi().mul(&Reel::pi()));
        assert_eq!(
            gauche.compare_tolerance(&droite, -100, &annul).unwrap(),
            std::cmp::Ordering::Equal
        );

        let inv = Reel::pi().inverse().unwrap();
        assert_eq!(
            inv.to_string_tronquee(15, &annul).unwrap(),
            "0.318309886183790"
        );
        assert_eq!(
            Reel::pi().neg().abs().to_string_tronquee(3, &annul).unwrap(),
            "3.141"
        );
    }
}
