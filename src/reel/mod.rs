// src/reel/mod.rs
//
// Réels constructifs.
// Un réel est une fonction `p -> a` (entier) telle que |a·2^p − x| < 2^p.
// Les nœuds s’enchaînent paresseusement : construire `a + b` ne calcule rien,
// seule une demande d’approximation descend dans l’arbre.
// Chaque nœud garde sa meilleure approximation (memo) et la réutilise
// (arrondie) pour toute précision plus grossière.

mod annulation;
mod base;
mod fonction;
mod lecture;
mod transcendant;
mod trig_exacte;

#[cfg(test)]
mod tests_scientifiques;

pub use annulation::Annulation;
pub use fonction::{
    compose, derivee_monotone, identite, inverse_monotone, oppose, DeriveeMonotone,
    FonctionReelle, InverseMonotone,
};
pub use lecture::decimal_echelonne;

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use crate::erreur::ErreurCalcul;

/// Borne absolue sur |p| : au-delà, `DepassementPrecision`.
pub(crate) const PRECISION_MAX: i32 = 1 << 28;

/// Garde sous l’unité de troncature : x·10^n est lu à 2^-32 près.
const GARDE_TRONCATURE: i32 = 32;

/* ------------------------ Contrat d’approximation ------------------------ */

pub(crate) trait Approximation: Send + Sync {
    /// Entier `a` tel que |a·2^p − x| < 2^p.
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul>;
}

/// Forme exacte connue à la construction (permet les résultats exacts).
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Forme {
    Quelconque,
    Rationnel(BigRational),
    /// k·π avec k rationnel non nul
    MultiplePi(BigRational),
}

struct Noeud {
    calcul: Box<dyn Approximation>,
    forme: Forme,
    /// (précision, approximation) la plus fine obtenue jusqu’ici
    memo: Mutex<Option<(i32, BigInt)>>,
}

/// Réel constructif partagé (clonage = compteur de références).
#[derive(Clone)]
pub struct Reel(Arc<Noeud>);

impl fmt::Debug for Reel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.forme {
            Forme::Rationnel(q) => write!(f, "Reel({q})"),
            Forme::MultiplePi(k) => write!(f, "Reel({k}·π)"),
            Forme::Quelconque => f.write_str("Reel(…)"),
        }
    }
}

/* ------------------------ Outils entiers ------------------------ */

/// k·2^n, arrondi au plus proche quand n < 0.
pub(crate) fn echelle(k: &BigInt, n: i32) -> BigInt {
    if n >= 0 {
        k << (n as usize)
    } else {
        let ajuste: BigInt = (k >> ((-n - 1) as usize)) + 1;
        ajuste >> 1usize
    }
}

/// Longueur binaire de |a|.
pub(crate) fn longueur_bits(a: &BigInt) -> i32 {
    a.bits() as i32
}

fn verifie_precision(p: i32) -> Result<(), ErreurCalcul> {
    if p <= -PRECISION_MAX || p >= PRECISION_MAX {
        Err(ErreurCalcul::DepassementPrecision)
    } else {
        Ok(())
    }
}

/* ------------------------ Réel : noyau ------------------------ */

impl Reel {
    pub(crate) fn nouveau(calcul: impl Approximation + 'static, forme: Forme) -> Reel {
        Reel(Arc::new(Noeud {
            calcul: Box::new(calcul),
            forme,
            memo: Mutex::new(None),
        }))
    }

    pub(crate) fn forme(&self) -> &Forme {
        &self.0.forme
    }

    /// Valeur rationnelle exacte, si connue.
    pub fn rationnel_exact(&self) -> Option<&BigRational> {
        match &self.0.forme {
            Forme::Rationnel(q) => Some(q),
            _ => None,
        }
    }

    fn memo(&self) -> Option<(i32, BigInt)> {
        self.0
            .memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Approximation à la précision 2^p (convention interne).
    /// Le verrou du memo n’est jamais tenu pendant le calcul.
    pub(crate) fn appr(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        verifie_precision(p)?;
        if let Some((p0, a)) = self.memo() {
            if p >= p0 {
                return Ok(echelle(&a, p0 - p));
            }
        }
        annul.verifie()?;

        let a = self.0.calcul.approxime(p, annul)?;

        let mut memo = self.0.memo.lock().unwrap_or_else(PoisonError::into_inner);
        match &*memo {
            Some((p0, _)) if *p0 <= p => {}
            _ => *memo = Some((p, a.clone())),
        }
        Ok(a)
    }

    /// `a` tel que |a − x·2^bits| < 1 : `bits` bits après la virgule binaire.
    pub fn approx(&self, bits: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        let p = bits.checked_neg().ok_or(ErreurCalcul::DepassementPrecision)?;
        self.appr(p, annul)
    }

    /* ------------------------ msd ------------------------ */

    /// msd déduit du memo, si l’approximation mémorisée dépasse 1 en valeur absolue.
    fn msd_memo(&self) -> Option<i32> {
        let (p0, a) = self.memo()?;
        if a.abs() > BigInt::one() {
            Some(p0 + longueur_bits(&a) - 1)
        } else {
            None
        }
    }

    /// m tel que 2^(m−1) ≤ |x| < 2^(m+1), ou `None` si |x| < 2^n.
    pub(crate) fn msd_a(&self, n: i32, annul: &Annulation) -> Result<Option<i32>, ErreurCalcul> {
        if let Some(m) = self.msd_memo() {
            return Ok(Some(m));
        }
        let a = self.appr(n - 1, annul)?;
        if a.abs() <= BigInt::one() {
            return Ok(None);
        }
        Ok(Some(n - 1 + longueur_bits(&a) - 1))
    }

    /// Comme `msd_a`, mais en resserrant progressivement la précision.
    pub(crate) fn msd_iter(&self, n: i32, annul: &Annulation) -> Result<Option<i32>, ErreurCalcul> {
        let mut prec = 0;
        while prec > n.saturating_add(30) {
            if let Some(m) = self.msd_a(prec, annul)? {
                return Ok(Some(m));
            }
            annul.verifie()?;
            prec = (prec * 3) / 2 - 16;
        }
        self.msd_a(n, annul)
    }

    /// msd d’un réel supposé non nul : boucle jusqu’au dépassement de précision sinon.
    pub(crate) fn msd(&self, annul: &Annulation) -> Result<i32, ErreurCalcul> {
        if self.est_zero_certain() {
            return Err(ErreurCalcul::DepassementPrecision);
        }
        self.msd_iter(-PRECISION_MAX + 2, annul)?
            .ok_or(ErreurCalcul::DepassementPrecision)
    }

    /* ------------------------ Requêtes ------------------------ */

    pub fn est_zero_certain(&self) -> bool {
        matches!(&self.0.forme, Forme::Rationnel(q) if q.is_zero())
    }

    /// Signe de x (−1, 0 ou 1). Ne termine pas sur un zéro non reconnu :
    /// la boucle s’arrête alors par dépassement de précision ou annulation.
    pub fn signum(&self, annul: &Annulation) -> Result<i32, ErreurCalcul> {
        match &self.0.forme {
            Forme::Rationnel(q) => return Ok(signe_rationnel(q)),
            Forme::MultiplePi(k) => return Ok(signe_rationnel(k)),
            Forme::Quelconque => {}
        }
        let mut a = -20;
        loop {
            annul.verifie()?;
            let s = self.signum_a(a, annul)?;
            if s != 0 {
                return Ok(s);
            }
            a = a.checked_mul(2).ok_or(ErreurCalcul::DepassementPrecision)?;
        }
    }

    /// Signe, ou 0 si |x| < 2^a.
    fn signum_a(&self, a: i32, annul: &Annulation) -> Result<i32, ErreurCalcul> {
        if let Some((_, m)) = self.memo() {
            if !m.is_zero() {
                return Ok(if m.is_negative() { -1 } else { 1 });
            }
        }
        let appr = self.appr(a - 1, annul)?;
        Ok(if appr.is_zero() {
            0
        } else if appr.is_negative() {
            -1
        } else {
            1
        })
    }

    /// Comparaison certaine ; boucle (puis dépassement) si les deux valeurs sont égales
    /// sans que leurs formes exactes le révèlent.
    pub fn compare(&self, autre: &Reel, annul: &Annulation) -> Result<Ordering, ErreurCalcul> {
        if let (Forme::Rationnel(a), Forme::Rationnel(b)) = (&self.0.forme, &autre.0.forme) {
            return Ok(a.cmp(b));
        }
        let s = self.sub(autre).signum(annul)?;
        Ok(s.cmp(&0))
    }

    /// Comparaison à tolérance absolue 2^a : `Equal` si les valeurs sont trop proches.
    pub fn compare_tolerance(
        &self,
        autre: &Reel,
        a: i32,
        annul: &Annulation,
    ) -> Result<Ordering, ErreurCalcul> {
        let prec = a - 1;
        let x = self.appr(prec, annul)?;
        let y = autre.appr(prec, annul)?;
        if x > &y + 1 {
            Ok(Ordering::Greater)
        } else if x < &y - 1 {
            Ok(Ordering::Less)
        } else {
            Ok(Ordering::Equal)
        }
    }

    /// Nombre de chiffres décimaux qui suffisent à représenter x exactement.
    /// `Some(0)` pour un entier ; `None` si le développement est infini ou inconnu.
    pub fn chiffres_requis(&self) -> Option<i32> {
        let Forme::Rationnel(q) = &self.0.forme else {
            return None;
        };
        let mut d = q.denom().clone();
        let (mut deux, mut cinq) = (0i32, 0i32);
        let deux_b = BigInt::from(2);
        let cinq_b = BigInt::from(5);
        while (&d % &deux_b).is_zero() {
            d /= &deux_b;
            deux += 1;
        }
        while (&d % &cinq_b).is_zero() {
            d /= &cinq_b;
            cinq += 1;
        }
        if d.is_one() {
            Some(deux.max(cinq))
        } else {
            None
        }
    }

    /// Borne inférieure sur le nombre de bits nuls après la virgule binaire.
    /// Un zéro reconnu donne `u32::MAX` ; au-delà de `limite_bits`, on s’arrête à la limite.
    pub fn borne_zeros_tete(&self, limite_bits: u32, annul: &Annulation) -> Result<u32, ErreurCalcul> {
        if self.est_zero_certain() {
            return Ok(u32::MAX);
        }
        let limite = limite_bits.min((PRECISION_MAX / 2) as u32) as i32;
        Ok(match self.msd_iter(-limite, annul)? {
            Some(m) if m >= -1 => 0,
            Some(m) => (-m - 1) as u32,
            None => limite as u32,
        })
    }

    /// Majorant (rapide) du nombre de bits de la partie entière de |x|.
    pub fn bits_partie_entiere(&self, annul: &Annulation) -> Result<u64, ErreurCalcul> {
        match &self.0.forme {
            Forme::Rationnel(q) => Ok((q.numer() / q.denom()).bits()),
            Forme::MultiplePi(k) => Ok((k.numer() / k.denom()).bits() + 2),
            Forme::Quelconque => {
                if let Some(m) = self.msd_memo() {
                    return Ok(m.max(0) as u64 + 1);
                }
                // descente par pas fins : le premier succès ne porte que quelques bits
                let mut p = PRECISION_MAX / 2;
                while p > 0 {
                    let a = match self.appr(p, annul) {
                        // un nœud intermédiaire dépasse les bornes : on descend encore
                        Err(ErreurCalcul::DepassementPrecision) => BigInt::zero(),
                        autre => autre?,
                    };
                    if a.abs() > BigInt::one() {
                        let fin = p - 8;
                        let lu = self.appr(fin, annul)?.abs() + 1u32;
                        return Ok((fin + longueur_bits(&lu)).max(1) as u64);
                    }
                    p -= (p / 128).max(16);
                }
                Ok(match self.msd_iter(0, annul)? {
                    Some(m) if m >= 0 => (m + 1) as u64,
                    _ => 1,
                })
            }
        }
    }

    /// Développement décimal tronqué vers zéro, avec `n` chiffres après la virgule (n ≥ 1).
    /// Exact pour un rationnel. Sinon |x|·10^n est lu à 2^-32 près et on garde sa partie
    /// entière ; on ne passe à l’entier suivant que si la lecture en est à moins de 2^-31.
    /// Le dernier chiffre n’est donc jamais sous la vraie troncature, et ne la dépasse
    /// d’une unité que si |x|·10^n est à moins de 2^-31 d’un entier.
    pub fn to_string_tronquee(&self, n: i32, annul: &Annulation) -> Result<String, ErreurCalcul> {
        let n = n.max(1);
        if n >= PRECISION_MAX / 4 {
            return Err(ErreurCalcul::DepassementPrecision);
        }
        let chiffres = n as usize;
        let puissance = lecture::pow10(chiffres);
        let tronque = match &self.0.forme {
            Forme::Rationnel(q) => (q.numer() * &puissance) / q.denom(),
            _ => {
                let agrandi = self.mul(&Reel::entier(puissance));
                let a = agrandi.appr(-GARDE_TRONCATURE, annul)?;
                let garde = GARDE_TRONCATURE as usize;
                let lu = a.abs();
                let mut m = &lu >> garde;
                // lecture collée à l’entier suivant : la vraie valeur peut l’atteindre
                if (&lu + 1u32) >> garde > m {
                    m += 1u32;
                }
                if a.is_negative() {
                    -m
                } else {
                    m
                }
            }
        };
        Ok(lecture::decimal_echelonne(&tronque, chiffres))
    }
}

fn signe_rationnel(q: &BigRational) -> i32 {
    if q.is_zero() {
        0
    } else if q.is_negative() {
        -1
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn q(n: i64, d: i64) -> Reel {
        Reel::rationnel(BigRational::new(BigInt::from(n), BigInt::from(d)))
    }

    #[test]
    fn echelle_arrondit_au_plus_proche() {
        assert_eq!(echelle(&BigInt::from(5), 1), BigInt::from(10));
        assert_eq!(echelle(&BigInt::from(5), -1), BigInt::from(3)); // 2.5 -> 3
        assert_eq!(echelle(&BigInt::from(-5), -1), BigInt::from(-2)); // -2.5 -> -2
        assert_eq!(echelle(&BigInt::from(7), -2), BigInt::from(2)); // 1.75 -> 2
    }

    #[test]
    fn rationnel_respecte_le_contrat() {
        let annul = Annulation::new();
        let x = q(1, 3);
        // 1/3 · 2^10 = 341.33
        assert_eq!(x.approx(10, &annul).unwrap(), BigInt::from(341));
        assert_eq!(q(-1, 3).approx(10, &annul).unwrap(), BigInt::from(-341));
    }

    #[test]
    fn precision_hors_bornes() {
        let annul = Annulation::new();
        assert_eq!(
            q(1, 3).approx(PRECISION_MAX, &annul),
            Err(ErreurCalcul::DepassementPrecision)
        );
    }

    #[test]
    fn annulation_observee() {
        let annul = Annulation::new();
        annul.annule();
        let x = Reel::pi().mul(&q(1, 3));
        assert_eq!(x.approx(100, &annul), Err(ErreurCalcul::Annule));
    }

    #[test]
    fn memo_sert_les_precisions_grossieres() {
        let annul = Annulation::new();
        let pi = Reel::pi().mul(&Reel::entier(3));
        let fin = pi.approx(200, &annul).unwrap();
        let gros = pi.approx(20, &annul).unwrap();
        assert_eq!(gros, echelle(&fin, -180));
    }

    #[test]
    fn troncature_vers_zero() {
        let annul = Annulation::new();
        assert_eq!(q(-2, 3).to_string_tronquee(4, &annul).unwrap(), "-0.6666");
        assert_eq!(q(1, 8).to_string_tronquee(2, &annul).unwrap(), "0.12");
        assert_eq!(
            Reel::pi().to_string_tronquee(20, &annul).unwrap(),
            "3.14159265358979323846"
        );
        assert_eq!(
            Reel::pi().neg().to_string_tronquee(5, &annul).unwrap(),
            "-3.14159"
        );
        // toujours au moins un chiffre après la virgule
        assert_eq!(Reel::entier(7).to_string_tronquee(0, &annul).unwrap(), "7.0");
    }

    #[test]
    fn chiffres_requis_et_zero() {
        assert_eq!(q(1, 8).chiffres_requis(), Some(3));
        assert_eq!(q(3, 20).chiffres_requis(), Some(2));
        assert_eq!(Reel::entier(12).chiffres_requis(), Some(0));
        assert_eq!(q(1, 3).chiffres_requis(), None);
        assert_eq!(Reel::pi().chiffres_requis(), None);
        assert!(Reel::entier(0).est_zero_certain());
        assert!(!Reel::pi().est_zero_certain());
    }

    #[test]
    fn signe_et_comparaison() {
        let annul = Annulation::new();
        let a = Reel::pi();
        let b = q(22, 7);
        assert_eq!(a.compare(&b, &annul).unwrap(), Ordering::Less);
        assert_eq!(a.sub(&b).signum(&annul).unwrap(), -1);
        assert_eq!(
            a.compare_tolerance(&b, -5, &annul).unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            a.compare_tolerance(&b, -20, &annul).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn zeros_de_tete_et_partie_entiere() {
        let annul = Annulation::new();
        // 2^-20 : au moins 18 bits nuls après la virgule
        let petit = Reel::pi().decale(-21);
        let z = petit.borne_zeros_tete(1000, &annul).unwrap();
        assert!((18..=20).contains(&z), "{z}");
        assert_eq!(Reel::entier(0).borne_zeros_tete(50, &annul).unwrap(), u32::MAX);

        assert_eq!(Reel::entier(1000).bits_partie_entiere(&annul).unwrap(), 10);
        let gros = Reel::pi().decale(40);
        let b = gros.bits_partie_entiere(&annul).unwrap();
        assert!((42..=43).contains(&b), "{b}");
    }
}
