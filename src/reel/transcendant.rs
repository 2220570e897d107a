// src/reel/transcendant.rs
//
// Fonctions transcendantes.
// - séries “préscalées” (argument déjà réduit) : exp, ln(1+x), cos
// - plans paresseux : la réduction d’argument (qui lit une approximation grossière)
//   n’a lieu qu’à la première demande de précision
// - angles spéciaux et résultats rationnels reconnus avant toute série

use std::sync::OnceLock;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use super::fonction::{inverse_monotone, FonctionReelle, InverseMonotone};
use super::trig_exacte::{valeur_speciale, Circulaire, Speciale};
use super::{echelle, longueur_bits, Annulation, Approximation, Forme, Reel};
use crate::erreur::ErreurCalcul;

/// Au-delà, une puissance rationnelle exacte n’est pas développée : elle passe par exp.
const BITS_MAX_PUISSANCE_EXACTE: u64 = 1 << 20;

/// Au-delà, même la forme paresseuse exp(n·ln|b|) est refusée.
const BITS_MAX_PUISSANCE: u64 = 1 << 24;

/// ceil(log2(|n| + 1))
fn borne_log2(n: i32) -> i32 {
    32 - n.unsigned_abs().leading_zeros() as i32
}

/* ------------------------ Séries préscalées ------------------------ */

/// exp(x) pour |x| < 1/2.
struct ExpPrescale(Reel);

impl Approximation for ExpPrescale {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        if p >= 1 {
            return Ok(BigInt::zero());
        }
        let iterations = -p / 2 + 2;
        let prec_calcul = p - borne_log2(2 * iterations) - 4;
        let prec_op = p - 3;
        let op = self.0.appr(prec_op, annul)?;

        let un = BigInt::one() << ((-prec_calcul) as usize);
        let mut terme = un.clone();
        let mut somme = un;
        let mut n = 0i64;
        let erreur_max = BigInt::one() << ((p - 4 - prec_calcul) as usize);

        while terme.abs() >= erreur_max {
            annul.verifie()?;
            n += 1;
            terme = echelle(&(terme * &op), prec_op) / n;
            somme += &terme;
        }
        Ok(echelle(&somme, prec_calcul - p))
    }
}

/// ln(1 + x) pour |x| < 1/2.
struct LnPrescale(Reel);

impl Approximation for LnPrescale {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        if p >= 0 {
            return Ok(BigInt::zero());
        }
        let iterations = -p;
        let prec_calcul = p - borne_log2(2 * iterations) - 4;
        let prec_op = p - 3;
        let op = self.0.appr(prec_op, annul)?;

        let mut puissance = echelle(&op, prec_op - prec_calcul);
        let mut terme = puissance.clone();
        let mut somme = terme.clone();
        let mut n = 1i64;
        let mut signe = 1i64;
        let erreur_max = BigInt::one() << ((p - 4 - prec_calcul) as usize);

        while terme.abs() >= erreur_max {
            annul.verifie()?;
            n += 1;
            signe = -signe;
            puissance = echelle(&(puissance * &op), prec_op);
            terme = &puissance / (n * signe);
            somme += &terme;
        }
        Ok(echelle(&somme, prec_calcul - p))
    }
}

/// cos(x) pour |x| < 1.
struct CosPrescale(Reel);

impl Approximation for CosPrescale {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        if p >= 1 {
            return Ok(BigInt::zero());
        }
        let iterations = -p / 2 + 4;
        let prec_calcul = p - borne_log2(2 * iterations) - 4;
        let prec_op = p - 2;
        let op = self.0.appr(prec_op, annul)?;

        let mut terme = BigInt::one() << ((-prec_calcul) as usize);
        let mut somme = terme.clone();
        let mut n = 0i64;
        let erreur_max = BigInt::one() << ((p - 4 - prec_calcul) as usize);

        while terme.abs() >= erreur_max {
            annul.verifie()?;
            n += 2;
            terme = echelle(&(terme * &op), prec_op);
            terme = echelle(&(terme * &op), prec_op);
            terme /= -n * (n - 1);
            somme += &terme;
        }
        Ok(echelle(&somme, prec_calcul - p))
    }
}

/// √x par racine entière, avec deux bits de garde.
struct Racine(Reel);

impl Approximation for Racine {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        const GARDE: i32 = 2;
        let prec_op = (p - GARDE)
            .checked_mul(2)
            .ok_or(ErreurCalcul::DepassementPrecision)?;
        let mut a = self.0.appr(prec_op, annul)?;
        if a.is_negative() {
            if a < -BigInt::one() {
                return Err(ErreurCalcul::Domaine("racine d’un nombre négatif".into()));
            }
            a = BigInt::zero();
        }
        Ok(echelle(&a.sqrt(), -GARDE))
    }
}

/* ------------------------ Plans paresseux ------------------------ */

type Fabrique = Box<dyn Fn(&Annulation) -> Result<Reel, ErreurCalcul> + Send + Sync>;

/// Nœud dont la forme de calcul n’est choisie qu’à la première approximation.
struct Differe {
    plan: OnceLock<Reel>,
    fabrique: Fabrique,
}

impl Approximation for Differe {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        let plan = match self.plan.get() {
            Some(r) => r.clone(),
            None => {
                let r = (self.fabrique)(annul)?;
                // premier écrivain gagnant
                let _ = self.plan.set(r.clone());
                self.plan.get().cloned().unwrap_or(r)
            }
        };
        plan.appr(p, annul)
    }
}

fn differe(
    fabrique: impl Fn(&Annulation) -> Result<Reel, ErreurCalcul> + Send + Sync + 'static,
) -> Reel {
    Reel::nouveau(
        Differe {
            plan: OnceLock::new(),
            fabrique: Box::new(fabrique),
        },
        Forme::Quelconque,
    )
}

/* ------------------------ Constantes ------------------------ */

static LN2: OnceLock<Reel> = OnceLock::new();
static ASIN: OnceLock<InverseMonotone> = OnceLock::new();

fn inverse_de(n: i64) -> Reel {
    Reel::rationnel(BigRational::new(BigInt::one(), BigInt::from(n)))
}

/// ln 2 = 7·ln(10/9) − 2·ln(25/24) + 3·ln(81/80)
fn ln2() -> Reel {
    LN2.get_or_init(|| {
        let ln_1_plus = |n: i64| Reel::nouveau(LnPrescale(inverse_de(n)), Forme::Quelconque);
        let a = ln_1_plus(9).mul(&Reel::entier(7));
        let b = ln_1_plus(24).mul(&Reel::entier(2));
        let c = ln_1_plus(80).mul(&Reel::entier(3));
        a.sub(&b).add(&c)
    })
    .clone()
}

/// arcsin comme inverse de sin sur [−π/2, π/2], paramètres partagés par tout le processus.
fn arcsin() -> &'static InverseMonotone {
    ASIN.get_or_init(|| {
        let demi_pi = Reel::multiple_pi(BigRational::new(BigInt::one(), BigInt::from(2)));
        let sin = std::sync::Arc::new(|x: &Reel| x.sin());
        inverse_monotone(sin, demi_pi.neg(), demi_pi)
    })
}

fn demi(n: i64) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(2))
}

/// q/d
fn fraction(q: &BigRational, d: i64) -> BigRational {
    q / BigRational::from_integer(BigInt::from(d))
}

/// n entier si q en est un et tient dans un i64.
fn entier_exact(q: &BigRational) -> Option<i64> {
    if q.is_integer() {
        q.numer().to_i64()
    } else {
        None
    }
}

/// Racine carrée exacte d’un entier naturel, si parfaite.
fn racine_parfaite(n: &BigInt) -> Option<BigInt> {
    let r = n.sqrt();
    if &r * &r == *n {
        Some(r)
    } else {
        None
    }
}

/* ------------------------ Fonctions ------------------------ */

impl Reel {
    pub fn exp(&self) -> Reel {
        if self.est_zero_certain() {
            return Reel::un();
        }
        let x = self.clone();
        differe(move |annul| {
            let grossier = x.appr(-10, annul)?;
            if grossier.is_negative() {
                return Ok(x.neg().exp().inverse_non_nul());
            }
            if grossier > BigInt::from(2) {
                let r = x.decale(-1).exp();
                return Ok(r.mul(&r));
            }
            Ok(Reel::nouveau(ExpPrescale(x.clone()), Forme::Quelconque))
        })
    }

    /// ln(x) ; un argument négatif ou nul est une erreur de domaine
    /// (détectée à la construction si x est rationnel, sinon à la première approximation).
    pub fn ln(&self) -> Result<Reel, ErreurCalcul> {
        if let Forme::Rationnel(q) = self.forme() {
            if !q.is_positive() {
                return Err(ErreurCalcul::Domaine(
                    "logarithme d’un nombre négatif ou nul".into(),
                ));
            }
            if q.is_one() {
                return Ok(Reel::zero());
            }
        }
        Ok(self.ln_sans_verif())
    }

    fn ln_sans_verif(&self) -> Reel {
        let x = self.clone();
        differe(move |annul| {
            // en seizièmes
            let grossier = x.appr(-4, annul)?;
            if grossier.is_negative() {
                return Err(ErreurCalcul::Domaine(
                    "logarithme d’un nombre négatif".into(),
                ));
            }
            if grossier <= BigInt::from(8) {
                return Ok(x.inverse_non_nul().ln_sans_verif().neg());
            }
            if grossier >= BigInt::from(24) {
                if grossier <= BigInt::from(64) {
                    let quart = x
                        .racine_non_negative()
                        .racine_non_negative()
                        .ln_sans_verif();
                    return Ok(quart.decale(2));
                }
                let bits_extra = longueur_bits(&grossier) - 3;
                let reduit = x.decale(-bits_extra).ln_sans_verif();
                return Ok(reduit.add(&Reel::entier(bits_extra).mul(&ln2())));
            }
            Ok(Reel::nouveau(LnPrescale(x.sub(&Reel::un())), Forme::Quelconque))
        })
    }

    /// log10 ; exact pour les puissances entières de 10.
    pub fn log10(&self) -> Result<Reel, ErreurCalcul> {
        if let Forme::Rationnel(q) = self.forme() {
            if q.is_positive() {
                let dix = BigInt::from(10);
                let (num, den) = (q.numer(), q.denom());
                let exposant = |mut m: BigInt| {
                    let mut k = 0i64;
                    while m > BigInt::one() && (&m % &dix).is_zero() {
                        m /= &dix;
                        k += 1;
                    }
                    m.is_one().then_some(k)
                };
                if den.is_one() {
                    if let Some(k) = exposant(num.clone()) {
                        return Ok(Reel::entier(k));
                    }
                } else if num.is_one() {
                    if let Some(k) = exposant(den.clone()) {
                        return Ok(Reel::entier(-k));
                    }
                }
            }
        }
        self.ln()?.div(&Reel::entier(10).ln_sans_verif())
    }

    /// √x ; exacte pour les carrés parfaits rationnels.
    pub fn sqrt(&self) -> Result<Reel, ErreurCalcul> {
        if let Forme::Rationnel(q) = self.forme() {
            if q.is_negative() {
                return Err(ErreurCalcul::Domaine("racine d’un nombre négatif".into()));
            }
            if let (Some(n), Some(d)) = (racine_parfaite(q.numer()), racine_parfaite(q.denom())) {
                return Ok(Reel::rationnel(BigRational::new(n, d)));
            }
        }
        Ok(self.racine_non_negative())
    }

    /// √x sans contrôle de forme ; un argument négatif échoue à l’approximation.
    pub(crate) fn racine_non_negative(&self) -> Reel {
        Reel::nouveau(Racine(self.clone()), Forme::Quelconque)
    }

    pub fn cos(&self) -> Reel {
        match self.forme() {
            Forme::Rationnel(q) if q.is_zero() => return Reel::un(),
            Forme::MultiplePi(k) => {
                if let Some(Speciale::Valeur(v)) = valeur_speciale(k, Circulaire::Cos) {
                    return v;
                }
            }
            _ => {}
        }
        let x = self.clone();
        differe(move |annul| {
            // multiples de π/2 : 2x/π
            let demi_tours = x.mul(&Reel::pi().inverse_non_nul()).appr(-1, annul)?;
            if demi_tours.abs() >= BigInt::from(2) {
                // réduction par le multiple de π le plus proche
                let m = echelle(&demi_tours, -1);
                let reduit = x.sub(&Reel::pi().mul(&Reel::entier(m.clone()))).cos();
                let impair = !(&m % BigInt::from(2)).is_zero();
                return Ok(if impair { reduit.neg() } else { reduit });
            }
            if x.appr(-1, annul)?.abs() >= BigInt::from(2) {
                // cos(x) = 2cos²(x/2) − 1
                let c = x.decale(-1).cos();
                return Ok(c.mul(&c).decale(1).sub(&Reel::un()));
            }
            Ok(Reel::nouveau(CosPrescale(x.clone()), Forme::Quelconque))
        })
    }

    pub fn sin(&self) -> Reel {
        match self.forme() {
            Forme::Rationnel(q) if q.is_zero() => return Reel::zero(),
            Forme::MultiplePi(k) => {
                if let Some(Speciale::Valeur(v)) = valeur_speciale(k, Circulaire::Sin) {
                    return v;
                }
            }
            _ => {}
        }
        // sin(x) = cos(π/2 − x)
        Reel::multiple_pi(demi(1)).sub(self).cos()
    }

    /// tan ; indéfinie aux multiples impairs reconnus de π/2.
    pub fn tan(&self) -> Result<Reel, ErreurCalcul> {
        if let Forme::MultiplePi(k) = self.forme() {
            match valeur_speciale(k, Circulaire::Tan) {
                Some(Speciale::Valeur(v)) => return Ok(v),
                Some(Speciale::Indefini) => {
                    return Err(ErreurCalcul::Domaine("tangente indéfinie".into()))
                }
                None => {}
            }
        }
        if self.est_zero_certain() {
            return Ok(Reel::zero());
        }
        self.sin().div(&self.cos())
    }

    /// arcsin sur [−1, 1].
    pub fn asin(&self) -> Result<Reel, ErreurCalcul> {
        if let Forme::Rationnel(q) = self.forme() {
            let un = BigRational::one();
            if q.abs() > un {
                return Err(ErreurCalcul::Domaine("arcsin hors de [−1, 1]".into()));
            }
            if q.is_zero() {
                return Ok(Reel::zero());
            }
            if q.abs().is_one() {
                return Ok(Reel::multiple_pi(fraction(q, 2)));
            }
            if q.abs() == demi(1) {
                return Ok(Reel::multiple_pi(fraction(q, 3)));
            }
        }
        Ok(arcsin().applique(self))
    }

    /// arccos = π/2 − arcsin.
    pub fn acos(&self) -> Result<Reel, ErreurCalcul> {
        Ok(Reel::multiple_pi(demi(1)).sub(&self.asin()?))
    }

    /// arctan(x) = arcsin(x / √(1 + x²)).
    pub fn atan(&self) -> Result<Reel, ErreurCalcul> {
        if let Forme::Rationnel(q) = self.forme() {
            if q.is_zero() {
                return Ok(Reel::zero());
            }
            if q.abs().is_one() {
                return Ok(Reel::multiple_pi(fraction(q, 4)));
            }
        }
        let norme = Reel::un().add(&self.mul(self)).sqrt()?;
        let s = self.div(&norme)?;
        Ok(arcsin().applique(&s))
    }

    /// base^exposant.
    /// Exposant entier : exact pour une base rationnelle (sous un plafond de taille),
    /// sinon exponentiation rapide. Exposant quelconque : exp(exposant·ln base).
    pub fn puissance(&self, exposant: &Reel) -> Result<Reel, ErreurCalcul> {
        if let Forme::Rationnel(e) = exposant.forme() {
            if let Some(n) = entier_exact(e) {
                return self.puissance_entiere(n);
            }
            if *e == demi(1) {
                return self.sqrt();
            }
        }
        if let Forme::Rationnel(b) = self.forme() {
            if b.is_negative() {
                return Err(ErreurCalcul::Domaine(
                    "puissance non entière d’un nombre négatif".into(),
                ));
            }
            if b.is_zero() {
                // le signe de l’exposant est lu sous le jeton de la tâche qui évalue
                let e = exposant.clone();
                return Ok(differe(move |annul| match e.signum(annul)? {
                    1 => Ok(Reel::zero()),
                    _ => Err(ErreurCalcul::Domaine("0 à une puissance négative".into())),
                }));
            }
        }
        Ok(exposant.mul(&self.ln()?).exp())
    }

    fn puissance_entiere(&self, n: i64) -> Result<Reel, ErreurCalcul> {
        if n == 0 {
            return Ok(Reel::un());
        }
        if let Forme::Rationnel(b) = self.forme() {
            if b.is_zero() {
                return if n > 0 {
                    Ok(Reel::zero())
                } else {
                    Err(ErreurCalcul::Domaine("0 à une puissance négative".into()))
                };
            }
            let taille = b.numer().bits().max(b.denom().bits());
            if b.abs().is_one()
                || taille.saturating_mul(n.unsigned_abs()) <= BITS_MAX_PUISSANCE_EXACTE
            {
                return Ok(Reel::rationnel(rational_pow_int(b.clone(), n)));
            }
            // |b^n| ≈ 2^(n·(bits(num) − bits(den))) à |n| bits près
            let ecart = b.numer().bits().abs_diff(b.denom().bits()) + 1;
            if ecart.saturating_mul(n.unsigned_abs()) > BITS_MAX_PUISSANCE {
                return Err(ErreurCalcul::DepassementPrecision);
            }
            let module = Reel::entier(n).mul(&Reel::rationnel(b.abs()).ln()?).exp();
            return Ok(if b.is_negative() && n % 2 != 0 {
                module.neg()
            } else {
                module
            });
        }

        let mut e = n.unsigned_abs();
        let mut acc = Reel::un();
        let mut b = self.clone();
        while e > 0 {
            if (e & 1) == 1 {
                acc = acc.mul(&b);
            }
            e >>= 1;
            if e > 0 {
                b = b.mul(&b);
            }
        }
        if n < 0 {
            acc.inverse()
        } else {
            Ok(acc)
        }
    }
}

fn rational_pow_int(base: BigRational, exp: i64) -> BigRational {
    if exp < 0 {
        return rational_pow_int(base, -exp).recip();
    }

    let mut e = exp as u64;
    let mut acc = BigRational::one();
    let mut b = base;

    while e > 0 {
        if (e & 1) == 1 {
            acc *= b.clone();
        }
        e >>= 1;
        if e > 0 {
            b *= b.clone();
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i64, d: i64) -> Reel {
        Reel::rationnel(BigRational::new(BigInt::from(n), BigInt::from(d)))
    }

    fn texte(x: &Reel, n: i32) -> String {
        x.to_string_tronquee(n, &Annulation::new()).unwrap()
    }

    #[test]
    fn constantes_classiques() {
        assert_eq!(texte(&Reel::un().exp(), 30), "2.718281828459045235360287471352");
        assert_eq!(texte(&Reel::entier(2).sqrt().unwrap(), 30), "1.414213562373095048801688724209");
        assert_eq!(texte(&ln2(), 30), "0.693147180559945309417232121458");
        assert_eq!(texte(&Reel::entier(10).ln().unwrap(), 20), "2.30258509299404568401");
    }

    #[test]
    fn trig_generale() {
        assert_eq!(texte(&Reel::un().sin(), 20), "0.84147098480789650665");
        assert_eq!(texte(&Reel::un().cos(), 20), "0.54030230586813971740");
        // réduction d’argument
        assert_eq!(texte(&Reel::entier(100).sin(), 12), "-0.506365641109");
        assert_eq!(texte(&Reel::un().neg().exp(), 15), "0.367879441171442");
    }

    #[test]
    fn exacts_reconnus() {
        let six = Reel::multiple_pi(BigRational::new(BigInt::one(), BigInt::from(6)));
        assert_eq!(six.sin().forme(), &Forme::Rationnel(demi(1)));
        assert!(Reel::pi().sin().est_zero_certain());
        assert!(matches!(
            Reel::multiple_pi(demi(1)).tan(),
            Err(ErreurCalcul::Domaine(_))
        ));
        assert_eq!(q(9, 4).sqrt().unwrap().forme(), &Forme::Rationnel(demi(3)));
        assert_eq!(Reel::entier(1000).log10().unwrap().forme(), &Forme::Rationnel(BigRational::from_integer(BigInt::from(3))));
        assert_eq!(q(1, 100).log10().unwrap().forme(), &Forme::Rationnel(BigRational::from_integer(BigInt::from(-2))));
        assert_eq!(q(1, 2).asin().unwrap().forme(), &Forme::MultiplePi(BigRational::new(BigInt::one(), BigInt::from(6))));
        assert_eq!(Reel::un().atan().unwrap().forme(), &Forme::MultiplePi(BigRational::new(BigInt::one(), BigInt::from(4))));
        assert_eq!(
            Reel::entier(2).puissance(&Reel::entier(-3)).unwrap().forme(),
            &Forme::Rationnel(BigRational::new(BigInt::one(), BigInt::from(8)))
        );
    }

    #[test]
    fn domaines() {
        assert!(matches!(Reel::zero().ln(), Err(ErreurCalcul::Domaine(_))));
        assert!(matches!(Reel::entier(-4).sqrt(), Err(ErreurCalcul::Domaine(_))));
        assert!(matches!(Reel::entier(2).asin(), Err(ErreurCalcul::Domaine(_))));
        assert!(matches!(Reel::entier(-2).puissance(&q(1, 3)), Err(ErreurCalcul::Domaine(_))));
        assert!(matches!(Reel::zero().puissance(&Reel::entier(-1)), Err(ErreurCalcul::Domaine(_))));
        // domaine détecté à l’approximation
        let negatif = Reel::pi().neg().exp().sub(&Reel::un());
        assert!(matches!(
            negatif.ln().unwrap().approx(10, &Annulation::new()),
            Err(ErreurCalcul::Domaine(_))
        ));
        assert!(matches!(
            Reel::entier(10).puissance(&Reel::entier(1_000_000_000)),
            Err(ErreurCalcul::DepassementPrecision)
        ));
    }

    #[test]
    fn grande_puissance_rationnelle_paresseuse() {
        let annul = Annulation::new();
        let dix = Reel::entier(10).puissance(&Reel::entier(300_000)).unwrap();
        assert_eq!(dix.forme(), &Forme::Quelconque);
        // log2(10^300000) = 996578.43…
        let bits = dix.bits_partie_entiere(&annul).unwrap();
        assert!((996_579..=996_580).contains(&bits), "{bits}");

        // base négative, exposant impair : −(1 + 2^-600000)^3 ≈ −1
        let un_pres = BigInt::one() << 600_000usize;
        let b = Reel::rationnel(BigRational::new(-(&un_pres + 1u32), un_pres));
        let cube = b.puissance(&Reel::entier(3)).unwrap();
        assert_eq!(cube.forme(), &Forme::Quelconque);
        assert_eq!(
            cube.compare_tolerance(&Reel::entier(-1), -40, &annul).unwrap(),
            std::cmp::Ordering::Equal
        );
    }

    #[test]
    fn zero_puissance_reelle_suit_le_jeton_de_la_tache() {
        use std::sync::mpsc;
        use std::time::Duration;

        let racine = Reel::entier(2).sqrt().unwrap();
        // √2·√2 − 2 : zéro non reconnu, le signe ne se décide jamais
        let exposant = racine.mul(&racine).sub(&Reel::entier(2));
        let r = Reel::zero().puissance(&exposant).unwrap();
        assert_eq!(r.forme(), &Forme::Quelconque);

        let annul = Annulation::new();
        let jeton = annul.clone();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(r.approx(10, &jeton));
        });
        std::thread::sleep(Duration::from_millis(100));
        annul.annule();
        let recu = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("calcul non interrompu");
        assert_eq!(recu, Err(ErreurCalcul::Annule));

        assert_eq!(
            Reel::zero()
                .puissance(&Reel::pi())
                .unwrap()
                .approx(20, &Annulation::new())
                .unwrap(),
            BigInt::zero()
        );
    }

    #[test]
    fn fonctions_reciproques() {
        let annul = Annulation::new();
        let x = q(3, 10);
        let aller_retour = x.asin().unwrap().sin();
        assert_eq!(aller_retour.compare_tolerance(&x, -60, &annul).unwrap(), std::cmp::Ordering::Equal);
        let c = q(-7, 10);
        let retour = c.acos().unwrap().cos();
        assert_eq!(retour.compare_tolerance(&c, -60, &annul).unwrap(), std::cmp::Ordering::Equal);
        let t = Reel::entier(5);
        let retour_t = t.atan().unwrap().tan().unwrap();
        assert_eq!(retour_t.compare_tolerance(&t, -50, &annul).unwrap(), std::cmp::Ordering::Equal);
        // atan(√3) = π/3
        let pi_3 = Reel::entier(3).sqrt().unwrap().atan().unwrap();
        assert_eq!(texte(&pi_3, 15), "1.047197551196597");
    }

    #[test]
    fn puissances_irrationnelles() {
        // 2^0.5 = √2 ; e^π
        assert_eq!(texte(&Reel::entier(2).puissance(&q(1, 2)).unwrap(), 10), "1.4142135623");
        let e_pi = Reel::un().exp().puissance(&Reel::pi()).unwrap();
        assert_eq!(texte(&e_pi, 10), "23.1406926327");
        assert_eq!(texte(&Reel::pi().puissance(&Reel::entier(3)).unwrap(), 9), "31.006276680");
    }
}
