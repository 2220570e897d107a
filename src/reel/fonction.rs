// src/reel/fonction.rs
//
// Fonctions réelles comme objets : identité, opposé, composition,
// inverse d’une fonction monotone sur un intervalle, dérivée d’une fonction monotone.
// Les paramètres coûteux (images des bornes, msd) ne sont calculés qu’à la
// première approximation demandée, puis partagés par tous les arguments.

use std::sync::atomic::{AtomicI32, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use super::{echelle, longueur_bits, Annulation, Approximation, Forme, Reel, PRECISION_MAX};
use crate::erreur::ErreurCalcul;

pub trait FonctionReelle: Send + Sync {
    fn applique(&self, x: &Reel) -> Reel;
}

impl<F> FonctionReelle for F
where
    F: Fn(&Reel) -> Reel + Send + Sync,
{
    fn applique(&self, x: &Reel) -> Reel {
        self(x)
    }
}

pub fn identite() -> Arc<dyn FonctionReelle> {
    Arc::new(|x: &Reel| x.clone())
}

pub fn oppose() -> Arc<dyn FonctionReelle> {
    Arc::new(|x: &Reel| x.neg())
}

/// f ∘ g
pub fn compose(f: Arc<dyn FonctionReelle>, g: Arc<dyn FonctionReelle>) -> Arc<dyn FonctionReelle> {
    Arc::new(move |x: &Reel| f.applique(&g.applique(x)))
}

/// Réel d’approximation `h·2^prec`.
fn point(h: &BigInt, prec: i32) -> Reel {
    Reel::entier(h.clone()).decale(prec)
}

/// Compare deux approximations à ±1 près (0 = indiscernables).
fn comparaison_souple(x: &BigInt, y: &BigInt) -> i32 {
    if x > &(y + 1) {
        1
    } else if x < &(y - 1) {
        -1
    } else {
        0
    }
}

fn verrouille<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/* ------------------------ Inverse monotone ------------------------ */

struct ParamInverse {
    /// f, ou −f si f est décroissante
    f: Arc<dyn FonctionReelle>,
    negation: bool,
    f_bas: Reel,
    f_haut: Reel,
    msd_max: i32,
    prec_arg_max: i32,
    msd_derivee: i32,
}

struct DonneesInverse {
    f: Arc<dyn FonctionReelle>,
    bas: Reel,
    haut: Reel,
    parametres: Mutex<Option<Arc<ParamInverse>>>,
}

impl DonneesInverse {
    fn parametres(&self, annul: &Annulation) -> Result<Arc<ParamInverse>, ErreurCalcul> {
        if let Some(p) = verrouille(&self.parametres).clone() {
            return Ok(p);
        }

        let mut f_bas = self.f.applique(&self.bas);
        let mut f_haut = self.f.applique(&self.haut);
        let negation = f_bas.compare(&f_haut, annul)? == std::cmp::Ordering::Greater;
        let f = if negation {
            f_bas = f_bas.neg();
            f_haut = f_haut.neg();
            compose(oppose(), self.f.clone())
        } else {
            self.f.clone()
        };

        let (abs_bas, abs_haut) = (self.bas.abs(), self.haut.abs());
        let plus_grand = if abs_bas.compare(&abs_haut, annul)? == std::cmp::Ordering::Greater {
            abs_bas
        } else {
            abs_haut
        };
        let msd_max = plus_grand.msd(annul)?;
        let largeur = self.haut.sub(&self.bas);
        let prec_arg_max = largeur.msd(annul)? - 4;
        let msd_derivee = f_haut.sub(&f_bas).div(&largeur)?.msd(annul)?;

        let p = Arc::new(ParamInverse {
            f,
            negation,
            f_bas,
            f_haut,
            msd_max,
            prec_arg_max,
            msd_derivee,
        });
        *verrouille(&self.parametres) = Some(p.clone());
        Ok(p)
    }
}

/// Inverse d’une fonction monotone (croissante ou décroissante) sur [bas, haut].
#[derive(Clone)]
pub struct InverseMonotone(Arc<DonneesInverse>);

pub fn inverse_monotone(f: Arc<dyn FonctionReelle>, bas: Reel, haut: Reel) -> InverseMonotone {
    InverseMonotone(Arc::new(DonneesInverse {
        f,
        bas,
        haut,
        parametres: Mutex::new(None),
    }))
}

impl FonctionReelle for InverseMonotone {
    fn applique(&self, x: &Reel) -> Reel {
        Reel::nouveau(
            InverseEn {
                donnees: self.0.clone(),
                arg: x.clone(),
                arg_effectif: OnceLock::new(),
                memo: Mutex::new(None),
            },
            Forme::Quelconque,
        )
    }
}

/// f⁻¹(arg), par dichotomie et interpolation sur une grille à 2^prec_arg.
struct InverseEn {
    donnees: Arc<DonneesInverse>,
    arg: Reel,
    arg_effectif: OnceLock<Reel>,
    /// dernière approximation, pour amorcer la suivante
    memo: Mutex<Option<(i32, BigInt)>>,
}

const PREC_ARG_SUPPLEMENTAIRE: i32 = 4;

impl InverseEn {
    fn arg_effectif(&self, par: &ParamInverse) -> Reel {
        self.arg_effectif
            .get_or_init(|| if par.negation { self.arg.neg() } else { self.arg.clone() })
            .clone()
    }

    fn approx_interne(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        if let Some((p0, a)) = verrouille(&self.memo).clone() {
            if p >= p0 {
                return Ok(echelle(&a, p0 - p));
            }
        }
        let a = self.calcule(p, annul)?;
        let mut memo = verrouille(&self.memo);
        match &*memo {
            Some((p0, _)) if *p0 <= p => {}
            _ => *memo = Some((p, a.clone())),
        }
        Ok(a)
    }

    fn evalue_en(
        &self,
        par: &ParamInverse,
        h: &BigInt,
        a_borne: bool,
        f_borne: &Reel,
        prec_arg: i32,
        prec_eval: i32,
        annul: &Annulation,
    ) -> Result<BigInt, ErreurCalcul> {
        if a_borne {
            f_borne.appr(prec_eval, annul)
        } else {
            par.f.applique(&point(h, prec_arg)).appr(prec_eval, annul)
        }
    }

    fn calcule(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        let par = self.donnees.parametres(annul)?;
        let arg = self.arg_effectif(&par);

        let chiffres = par.msd_max - p;
        if chiffres < 0 {
            return Ok(BigInt::zero());
        }
        let prec_arg = (p - PREC_ARG_SUPPLEMENTAIRE).min(par.prec_arg_max);
        let mut prec_eval = prec_arg + par.msd_derivee - 20;
        if prec_eval <= -PRECISION_MAX {
            return Err(ErreurCalcul::DepassementPrecision);
        }

        let bas_appr = self.donnees.bas.appr(prec_arg, annul)? + 1;
        let haut_appr = self.donnees.haut.appr(prec_arg, annul)? - 1;
        let mut arg_appr = arg.appr(prec_eval, annul)?;

        let memo = verrouille(&self.memo).clone();
        let bonne_appr = matches!(&memo, Some((pm, _)) if *pm < par.msd_max);

        let (mut l, mut f_l, mut h, mut f_h);
        let (mut a_gauche, mut a_droite);
        let mut deficit: i32 = 0;

        if chiffres < 30 && !bonne_appr {
            // tout le domaine
            h = haut_appr;
            f_h = par.f_haut.appr(prec_eval, annul)?;
            l = bas_appr;
            f_l = par.f_bas.appr(prec_eval, annul)?;
            if f_h < &arg_appr - 1 || f_l > &arg_appr + 1 {
                return Err(ErreurCalcul::Domaine("argument hors de l’image".into()));
            }
            a_gauche = true;
            a_droite = true;
            deficit = 2;
        } else {
            // amorce depuis une approximation plus grossière
            let mut prec_grossiere = p + chiffres / 2;
            if let (true, Some((pm, _))) = (bonne_appr, &memo) {
                if chiffres < 30 || *pm < p + 3 * chiffres / 4 {
                    prec_grossiere = *pm;
                }
            }
            let grossiere = self.approx_interne(prec_grossiere, annul)?;
            let decalage = (prec_grossiere - prec_arg) as usize;
            h = (&grossiere + 1) << decalage;
            l = (&grossiere - 1) << decalage;

            if h > haut_appr {
                h = haut_appr;
                f_h = par.f_haut.appr(prec_eval, annul)?;
                a_droite = true;
            } else {
                f_h = par.f.applique(&point(&h, prec_arg)).appr(prec_eval, annul)?;
                a_droite = false;
            }
            if l < bas_appr {
                l = bas_appr;
                f_l = par.f_bas.appr(prec_eval, annul)?;
                a_gauche = true;
            } else {
                f_l = par.f.applique(&point(&l, prec_arg)).appr(prec_eval, annul)?;
                a_gauche = false;
            }
        }

        let mut difference = &h - &l;
        loop {
            annul.verifie()?;
            if difference < BigInt::from(6) {
                return Ok(echelle(&h, prec_arg - p));
            }

            let f_difference = &f_h - &f_l;
            let pas_binaire = deficit > 0 || f_difference.is_zero();
            let mut essai = if pas_binaire {
                deficit -= 1;
                (&l + &h) >> 1usize
            } else {
                // interpolation linéaire, tenue à distance des bornes
                let mut ajuste = ((&arg_appr - &f_l) * &difference) / &f_difference;
                if ajuste < (&difference >> 10usize) {
                    ajuste <<= 8usize;
                } else if ajuste > ((&difference * 1023) >> 10usize) {
                    ajuste = &difference - ((&difference - &ajuste) << 8usize);
                }
                if !ajuste.is_positive() {
                    ajuste = BigInt::from(2);
                }
                if ajuste >= difference {
                    ajuste = &difference - 2;
                }
                if ajuste.is_positive() {
                    &l + ajuste
                } else {
                    &l + 2
                }
            };

            // essai trop proche de arg : on bouge l’essai ou on affine l’évaluation
            let mut pas = BigInt::from(2);
            let mut affine = false;
            let (issue, f_essai) = loop {
                let f_essai = par.f.applique(&point(&essai, prec_arg)).appr(prec_eval, annul)?;
                let issue = comparaison_souple(&f_essai, &arg_appr);
                if issue != 0 {
                    break (issue, f_essai);
                }
                annul.verifie()?;
                if affine {
                    let ajustement = (-longueur_bits(&f_essai) / 4).min(-20);
                    prec_eval += ajustement;
                    if prec_eval <= -PRECISION_MAX {
                        return Err(ErreurCalcul::DepassementPrecision);
                    }
                    f_l = self.evalue_en(&par, &l, a_gauche, &par.f_bas, prec_arg, prec_eval, annul)?;
                    f_h = self.evalue_en(&par, &h, a_droite, &par.f_haut, prec_arg, prec_eval, annul)?;
                    arg_appr = arg.appr(prec_eval, annul)?;
                } else {
                    let suivant = &essai + &pas;
                    essai = if suivant >= h { &essai - &pas } else { suivant };
                    pas = -pas;
                }
                affine = !affine;
            };

            if issue > 0 {
                h = essai;
                f_h = f_essai;
                a_droite = false;
            } else {
                l = essai;
                f_l = f_essai;
                a_gauche = false;
            }
            let nouvelle = &h - &l;
            if !pas_binaire {
                if nouvelle >= (&difference >> 1usize) {
                    deficit += 1;
                } else {
                    deficit -= 1;
                }
            }
            difference = nouvelle;
        }
    }
}

impl Approximation for InverseEn {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        self.approx_interne(p, annul)
    }
}

/* ------------------------ Dérivée monotone ------------------------ */

struct ParamDerivee {
    msd_difference: i32,
    /// borne (relevée au besoin) sur le msd de la dérivée seconde
    msd_derivee2: AtomicI32,
}

struct DonneesDerivee {
    f: Arc<dyn FonctionReelle>,
    bas: Reel,
    haut: Reel,
    parametres: Mutex<Option<Arc<ParamDerivee>>>,
}

impl DonneesDerivee {
    fn parametres(&self, annul: &Annulation) -> Result<Arc<ParamDerivee>, ErreurCalcul> {
        if let Some(p) = verrouille(&self.parametres).clone() {
            return Ok(p);
        }
        let milieu = self.bas.add(&self.haut).decale(-1);
        let f_bas = self.f.applique(&self.bas);
        let f_milieu = self.f.applique(&milieu);
        let f_haut = self.f.applique(&self.haut);
        let difference = self.haut.sub(&self.bas);
        let difference2 = f_haut.sub(&f_milieu.decale(1)).add(&f_bas);

        let msd_difference = difference.msd(annul)?;
        let msd_derivee2 = match difference2.msd_a(msd_difference - 20, annul)? {
            Some(m) => m - msd_difference + 4,
            // dérivée seconde négligeable : pas de contrainte
            None => -PRECISION_MAX / 2,
        };

        let p = Arc::new(ParamDerivee {
            msd_difference,
            msd_derivee2: AtomicI32::new(msd_derivee2),
        });
        *verrouille(&self.parametres) = Some(p.clone());
        Ok(p)
    }
}

/// Dérivée d’une fonction monotone dérivable sur ]bas, haut[.
#[derive(Clone)]
pub struct DeriveeMonotone(Arc<DonneesDerivee>);

pub fn derivee_monotone(f: Arc<dyn FonctionReelle>, bas: Reel, haut: Reel) -> DeriveeMonotone {
    DeriveeMonotone(Arc::new(DonneesDerivee {
        f,
        bas,
        haut,
        parametres: Mutex::new(None),
    }))
}

impl FonctionReelle for DeriveeMonotone {
    fn applique(&self, x: &Reel) -> Reel {
        Reel::nouveau(
            DeriveeEn {
                f_arg: self.0.f.applique(x),
                donnees: self.0.clone(),
                arg: x.clone(),
                msd_delta_max: OnceLock::new(),
            },
            Forme::Quelconque,
        )
    }
}

struct DeriveeEn {
    donnees: Arc<DonneesDerivee>,
    arg: Reel,
    f_arg: Reel,
    msd_delta_max: OnceLock<i32>,
}

const PREC_DERIVEE_SUPPLEMENTAIRE: i32 = 4;

impl DeriveeEn {
    /// Plus grand pas sûr : l’écart à la borne la plus proche.
    fn msd_delta_max(&self, annul: &Annulation) -> Result<i32, ErreurCalcul> {
        if let Some(m) = self.msd_delta_max.get() {
            return Ok(*m);
        }
        let gauche = self.arg.sub(&self.donnees.bas);
        let droite = self.donnees.haut.sub(&self.arg);
        if gauche.signum(annul)? <= 0 || droite.signum(annul)? <= 0 {
            return Err(ErreurCalcul::Domaine("argument hors de l’intervalle".into()));
        }
        let m = gauche.msd(annul)?.min(droite.msd(annul)?) - 2;
        Ok(*self.msd_delta_max.get_or_init(|| m))
    }
}

impl Approximation for DeriveeEn {
    fn approxime(&self, p: i32, annul: &Annulation) -> Result<BigInt, ErreurCalcul> {
        let par = self.donnees.parametres(annul)?;
        let delta_max = self.msd_delta_max(annul)?;
        let prec_eval = p - PREC_DERIVEE_SUPPLEMENTAIRE;

        loop {
            annul.verifie()?;
            let d2 = par.msd_derivee2.load(AtomicOrdering::Acquire);
            let log_delta = (p - d2).min(delta_max) - PREC_DERIVEE_SUPPLEMENTAIRE;
            if log_delta <= -PRECISION_MAX / 2 {
                return Err(ErreurCalcul::DepassementPrecision);
            }

            let delta = Reel::un().decale(log_delta);
            let f_gauche = self.donnees.f.applique(&self.arg.sub(&delta));
            let f_droite = self.donnees.f.applique(&self.arg.add(&delta));
            let pente_gauche = self.f_arg.sub(&f_gauche).decale(-log_delta);
            let pente_droite = f_droite.sub(&self.f_arg).decale(-log_delta);

            let a_gauche = pente_gauche.appr(prec_eval, annul)?;
            let a_droite = pente_droite.appr(prec_eval, annul)?;
            let ecart = (&a_droite - &a_gauche).abs();

            if ecart < BigInt::from(8) {
                // moyenne des deux quotients, ramenée à la précision p
                return Ok(echelle(&(a_gauche + a_droite), -PREC_DERIVEE_SUPPLEMENTAIRE - 1));
            }

            // dérivée seconde sous-estimée : on la relève et on recommence
            let nouveau = prec_eval + longueur_bits(&ecart) + 4 - log_delta;
            par.msd_derivee2.fetch_max(nouveau, AtomicOrdering::AcqRel);
            tracing::trace!(
                msd_difference = par.msd_difference,
                msd_derivee2 = nouveau,
                "dérivée : pas trop grand, nouvel essai"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use num_rational::BigRational;
    use std::cmp::Ordering;

    fn q(n: i64, d: i64) -> Reel {
        Reel::rationnel(BigRational::new(BigInt::from(n), BigInt::from(d)))
    }

    fn proches(a: &Reel, b: &Reel, bits: i32) -> bool {
        a.compare_tolerance(b, -bits, &Annulation::new()).unwrap() == Ordering::Equal
    }

    #[test]
    fn composition_et_identite() {
        let f = compose(oppose(), Arc::new(|x: &Reel| x.exp()));
        let x = f.applique(&Reel::un());
        assert!(proches(&x, &Reel::un().exp().neg(), 80));
        assert!(proches(&identite().applique(&Reel::pi()), &Reel::pi(), 80));
    }

    #[test]
    fn inverse_de_exp_est_ln() {
        let ln = inverse_monotone(Arc::new(|x: &Reel| x.exp()), Reel::entier(-10), Reel::entier(10));
        let x = ln.applique(&Reel::entier(3));
        assert!(proches(&x, &Reel::entier(3).ln().unwrap(), 80));
        // précision fine après une approximation grossière (amorce par memo)
        let annul = Annulation::new();
        x.approx(10, &annul).unwrap();
        assert!(proches(&x, &Reel::entier(3).ln().unwrap(), 200));
    }

    #[test]
    fn inverse_de_ln_est_exp() {
        let exp = inverse_monotone(Arc::new(|x: &Reel| x.ln().unwrap()), q(1, 2), Reel::entier(10));
        let trois = exp.applique(&Reel::entier(3).ln().unwrap());
        assert!(proches(&trois, &Reel::entier(3), 60));
        let e = exp.applique(&Reel::un());
        assert!(proches(&e, &Reel::un().exp(), 60));
        // argument négatif : ln(7/10) < 0
        let x = exp.applique(&q(7, 10).ln().unwrap());
        assert!(proches(&x, &q(7, 10), 60));
    }

    #[test]
    fn inverse_de_fonction_decroissante() {
        // cos est décroissante sur [0, π] : son inverse est acos
        let acos = inverse_monotone(Arc::new(|x: &Reel| x.cos()), Reel::zero(), Reel::pi());
        let x = acos.applique(&q(1, 3));
        assert!(proches(&x.cos(), &q(1, 3), 70));
        assert_eq!(
            x.to_string_tronquee(12, &Annulation::new()).unwrap(),
            "1.230959417340"
        );
    }

    #[test]
    fn inverse_hors_image() {
        let racine = inverse_monotone(Arc::new(|x: &Reel| x.mul(x)), Reel::zero(), Reel::entier(4));
        let x = racine.applique(&Reel::entier(20));
        assert!(matches!(
            x.approx(10, &Annulation::new()),
            Err(ErreurCalcul::Domaine(_))
        ));
        let y = racine.applique(&Reel::entier(2));
        assert!(proches(&y, &Reel::entier(2).sqrt().unwrap(), 100));
    }

    #[test]
    fn derivees() {
        let d_exp = derivee_monotone(Arc::new(|x: &Reel| x.exp()), Reel::entier(-5), Reel::entier(5));
        assert!(proches(&d_exp.applique(&Reel::un()), &Reel::un().exp(), 60));

        let d_sin = derivee_monotone(Arc::new(|x: &Reel| x.sin()), Reel::entier(-1), Reel::entier(1));
        let x = q(1, 2);
        assert!(proches(&d_sin.applique(&x), &x.cos(), 60));

        let dehors = d_exp.applique(&Reel::entier(7));
        assert!(matches!(
            dehors.approx(10, &Annulation::new()),
            Err(ErreurCalcul::Domaine(_))
        ));
    }
}
