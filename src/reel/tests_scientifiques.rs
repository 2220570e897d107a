//! Tests scientifiques (campagne) : invariants des réels constructifs.
//!
//! But : vérifier le contrat d’approximation et les identités classiques
//! sans faire chauffer la machine.
//! - budget temps global
//! - précisions bornées (quelques centaines de bits)
//! - propriétés aléatoires en petit nombre de cas (proptest)

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Signed;
use proptest::prelude::*;

use super::{Annulation, Reel};

fn q(n: i64, d: i64) -> Reel {
    Reel::rationnel(BigRational::new(BigInt::from(n), BigInt::from(d)))
}

fn egaux(a: &Reel, b: &Reel, bits: i32) -> bool {
    a.compare_tolerance(b, -bits, &Annulation::new()).unwrap() == Ordering::Equal
}

/// Budget global anti-gel.
fn budget(start: Instant, max: Duration) {
    if start.elapsed() > max {
        panic!("budget temps dépassé: {:?}", max);
    }
}

/// Deux approximations d’un même réel, à n et n+k bits, sont compatibles.
fn coherent(x: &Reel, n: i32, k: i32) -> bool {
    let annul = Annulation::new();
    let gros = x.approx(n, &annul).unwrap();
    let fin = x.approx(n + k, &annul).unwrap();
    let ecart = ((gros << (k as usize)) - fin).abs();
    ecart <= (BigInt::from(1) << (k as usize)) + 1
}

/* ------------------------ Identités ------------------------ */

#[test]
fn sci_pythagore_et_periodicite() {
    let start = Instant::now();
    for (n, d) in [(1, 7), (3, 2), (-5, 3), (22, 1)] {
        let x = q(n, d);
        let s = x.sin();
        let c = x.cos();
        assert!(egaux(&s.mul(&s).add(&c.mul(&c)), &Reel::un(), 120), "x={n}/{d}");
        budget(start, Duration::from_secs(20));
    }

    // angles spéciaux équivalents modulo 2π
    let pi_4 = Reel::multiple_pi(BigRational::new(BigInt::from(1), BigInt::from(4)));
    let neuf_pi_4 = Reel::multiple_pi(BigRational::new(BigInt::from(9), BigInt::from(4)));
    assert!(egaux(&pi_4.sin(), &neuf_pi_4.sin(), 200));
    // tan(7π/6) = tan(π/6) = √3/3
    let sept_pi_6 = Reel::multiple_pi(BigRational::new(BigInt::from(7), BigInt::from(6)));
    assert!(egaux(&sept_pi_6.tan().unwrap(), &Reel::entier(3).sqrt().unwrap().div(&Reel::entier(3)).unwrap(), 150));
}

#[test]
fn sci_exp_ln_morphismes() {
    let start = Instant::now();
    let a = q(7, 3);
    let b = q(2, 9);
    // ln(ab) = ln a + ln b
    let gauche = a.mul(&b).ln().unwrap();
    let droite = a.ln().unwrap().add(&b.ln().unwrap());
    assert!(egaux(&gauche, &droite, 150));
    // exp(a + b) = exp a · exp b
    assert!(egaux(&a.add(&b).exp(), &a.exp().mul(&b.exp()), 150));
    // grands arguments : réduction par carrés et par ln 2
    let grand = Reel::entier(300);
    assert!(egaux(&grand.exp().ln().unwrap(), &grand, 100));
    assert!(egaux(&q(1, 1000).ln().unwrap().exp(), &q(1, 1000), 200));
    budget(start, Duration::from_secs(20));
}

#[test]
fn sci_racines_et_puissances() {
    let x = Reel::entier(7);
    let r = x.sqrt().unwrap();
    assert!(egaux(&r.mul(&r), &x, 200));
    // x^(1/3) par exp/ln
    let c = x.puissance(&q(1, 3)).unwrap();
    assert!(egaux(&c.mul(&c).mul(&c), &x, 150));
    // racine d’un réel qui n’est pas rationnel
    let rp = Reel::pi().sqrt().unwrap();
    assert!(egaux(&rp.mul(&rp), &Reel::pi(), 150));
}

#[test]
fn sci_zero_non_reconnu_ne_termine_pas() {
    // sin(1)² + cos(1)² − 1 vaut 0 sans que la forme le sache :
    // l’inverse boucle jusqu’au dépassement de précision (ou l’annulation).
    let x = Reel::un();
    let zero = x.sin().mul(&x.sin()).add(&x.cos().mul(&x.cos())).sub(&Reel::un());
    let annul = Annulation::new();
    let inv = zero.inverse().unwrap();
    let fil = {
        let annul = annul.clone();
        std::thread::spawn(move || inv.approx(10, &annul))
    };
    std::thread::sleep(Duration::from_millis(200));
    annul.annule();
    let issue = fil.join().unwrap();
    assert!(issue.is_err());
}

/* ------------------------ Propriétés ------------------------ */

const PI_DECIMAL: &str = "3.1415926535897932384626433832795028841971693993751058209749445923078164062862089986280348253421170679821480865132823066470938446095505822317253594081284811174502";

#[test]
fn sci_troncature_de_pi_chiffre_a_chiffre() {
    let start = Instant::now();
    let annul = Annulation::new();
    let pi = Reel::pi();
    for n in 1..=150usize {
        budget(start, Duration::from_secs(20));
        let lu = pi.to_string_tronquee(n as i32, &annul).unwrap();
        assert_eq!(lu, &PI_DECIMAL[..n + 2], "π à {n} chiffres");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_approximations_coherentes(n in -500i64..500, d in 1i64..200, bits in 0i32..150, k in 1i32..60) {
        let x = q(n, d);
        prop_assert!(coherent(&x.exp(), bits, k));
        prop_assert!(coherent(&x.sin(), bits, k));
        prop_assert!(coherent(&x.abs().add(&Reel::un()).sqrt().unwrap(), bits, k));
    }

    #[test]
    fn prop_troncature_vers_zero(n in -2_000i64..2_000, d in 1i64..1000, chiffres in 1i32..30) {
        let x = q(n, d);
        let annul = Annulation::new();
        let exact = x.to_string_tronquee(chiffres, &annul).unwrap();
        // même réel sans forme exacte : |x|·10^n reste à au moins 1/d d’un entier
        // ou tombe pile dessus, la lecture approchée doit donc donner les mêmes chiffres
        let opaque = x.exp().ln().unwrap();
        let approche = opaque.to_string_tronquee(chiffres, &annul).unwrap();
        prop_assert_eq!(exact, approche);
    }
}
