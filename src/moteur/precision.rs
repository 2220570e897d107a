//! src/moteur/precision.rs
//!
//! Politique de précision d’affichage (fonctions pures).
//!
//! Vocabulaire :
//! - offset : nombre de chiffres après la virgule (négatif : on s’arrête avant les unités ;
//!   -1 : entier affiché sans point décimal)
//! - msd : index, dans la chaîne en cache, du premier chiffre significatif
//! - lsd : position du dernier chiffre non nul (`ChiffreFaible`)

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, Zero};

use super::ecouteur::{ChiffreFaible, LargeurAffichage};
use crate::erreur::ErreurInterne;
use crate::reel::Reel;

/// Chiffres calculés au-delà de l’offset d’affichage préféré.
pub const CHIFFRES_EN_RESERVE: i32 = 20;

/// Place réservée à un exposant en notation scientifique.
pub const COUT_EXPOSANT: i32 = 3;

/// log2(10), pour convertir des chiffres en bits.
pub const LOG2_10: f64 = std::f64::consts::LOG2_10;

/// Premier caractère qui n’est ni '-', ni '.', ni '0'.
/// `None` si la chaîne ne contient que des zéros, ou si son seul chiffre non nul
/// est un '1' final (la troncature peut dépasser d’une unité).
pub fn index_msd(chiffres: &str) -> Option<usize> {
    let (i, c) = chiffres
        .char_indices()
        .find(|&(_, c)| c != '-' && c != '.' && c != '0')?;
    let dernier = i + c.len_utf8() == chiffres.len();
    if dernier && c == '1' {
        None
    } else {
        Some(i)
    }
}

/// Dernier chiffre non nul de `valeur`, lu sur sa forme exacte si elle en a une,
/// sinon sur la partie entière déjà en cache (zéros finaux d’un entier).
pub fn offset_chiffre_faible(valeur: &Reel, chiffres: &str, index_point: usize) -> ChiffreFaible {
    if valeur.est_zero_certain() {
        return ChiffreFaible::Zero;
    }
    match valeur.chiffres_requis() {
        None => ChiffreFaible::Inconnu,
        Some(0) => {
            let zeros = chiffres[..index_point.min(chiffres.len())]
                .bytes()
                .skip(1)
                .rev()
                .take_while(|&b| b == b'0')
                .count();
            ChiffreFaible::Position(-(zeros as i32))
        }
        Some(n) => ChiffreFaible::Position(n),
    }
}

/// Offset préféré pour l’affichage de `chiffres` dans `largeur` :
/// - entier exact qui tient : -1 (pas de point décimal)
/// - décimal exact qui tient : son nombre de chiffres après la virgule
/// - sinon : assez de chiffres pour remplir la ligne à partir du msd
///   (notation scientifique si la partie entière déborde)
pub fn offset_prefere(
    chiffres: &str,
    msd: Option<usize>,
    lsd: ChiffreFaible,
    largeur: &dyn LargeurAffichage,
) -> i32 {
    let ligne = largeur.caracteres_max() as i32;
    let index_point = chiffres.find('.').unwrap_or(chiffres.len());
    let partie_entiere = index_point as i32;
    let negatif = i32::from(chiffres.starts_with('-'));

    let separateurs = largeur.cout_separateurs(chiffres, index_point);
    let brut_sans_point = separateurs - largeur.credit_sans_ellipse();
    let brut_avec_point = brut_sans_point - largeur.credit_point_decimal();
    let sep_sans_point = brut_sans_point.max(0.0).ceil() as i32;
    let sep_avec_point = brut_avec_point.max(0.0).ceil() as i32;

    let dernier = match lsd {
        ChiffreFaible::Zero => Some(-1),
        ChiffreFaible::Position(0) => Some(-1),
        ChiffreFaible::Position(k) => Some(k),
        ChiffreFaible::Inconnu => None,
    };
    if let Some(k) = dernier {
        if k <= 0 && partie_entiere <= ligne - sep_sans_point {
            return -1;
        }
        if k > 0 && partie_entiere + k + 1 <= ligne - sep_avec_point {
            return k;
        }
    }

    let Some(mut msd) = msd.map(|m| m as i32) else {
        // zéro probable mais pas certain : "0.00000…" sur toute la ligne
        return (ligne - 2 - negatif).max(0);
    };
    if msd > partie_entiere && msd <= partie_entiere + COUT_EXPOSANT + 1 {
        // quelques zéros après la virgule : pas d’exposant, le zéro tient lieu de msd
        msd = partie_entiere - 1;
    }
    let mut offset = msd - partie_entiere + ligne - negatif - 1;
    if partie_entiere <= ligne - sep_sans_point {
        offset -= if partie_entiere < ligne - sep_avec_point {
            sep_avec_point
        } else {
            sep_sans_point
        };
    }
    offset
}

fn lit_entier(chiffres: &str) -> Result<BigInt, ErreurInterne> {
    let sans_point: String = chiffres.chars().filter(|&c| c != '.').collect();
    sans_point
        .parse::<BigInt>()
        .map_err(|_| ErreurInterne::ChaineIllisible(chiffres.to_string()))
}

/// Raccorde un raffinement aux chiffres déjà publiés.
///
/// La troncature ne descend jamais sous la vraie valeur (en valeur absolue) : le préfixe
/// recalculé reproduit donc l’ancienne chaîne, ou la dépasse d’une unité quand celle-ci
/// finissait par des 9 devenus des 0. Dans ce second cas la queue doit être nulle et les
/// 9 sont rétablis. Tout autre changement d’un chiffre publié est une contradiction.
pub fn corrige_zeros(
    ancien: &str,
    offset_ancien: i32,
    nouveau: &str,
    offset_nouveau: i32,
) -> Result<String, ErreurInterne> {
    if offset_nouveau < offset_ancien {
        return Err(ErreurInterne::PrecisionEnRecul {
            ancien: offset_ancien,
            nouveau: offset_nouveau,
        });
    }
    let ajout = (offset_nouveau - offset_ancien) as usize;
    if ancien.is_empty() || ajout == 0 {
        return Ok(nouveau.to_string());
    }
    if nouveau.len() < ancien.len() + ajout || !nouveau.is_ascii() || !ancien.is_ascii() {
        return Err(ErreurInterne::ChaineIllisible(nouveau.to_string()));
    }

    let contradiction = || ErreurInterne::ApproximationContradictoire {
        ancien: ancien.to_string(),
        nouveau: nouveau.to_string(),
    };

    let coupe = nouveau.len() - ajout;
    let (tete, queue) = nouveau.split_at(coupe);
    let avant = lit_entier(ancien)?;
    let apres = lit_entier(tete)?;
    // égalité numérique : "0.00" et "-0.00" sont le même préfixe
    if avant == apres {
        return Ok(nouveau.to_string());
    }
    let meme_signe = avant.is_negative() == apres.is_negative() || avant.is_zero();
    let bascule = meme_signe
        && apres.magnitude() == &(avant.magnitude() + BigUint::one())
        && ancien.ends_with('9')
        && tete.ends_with('0')
        && queue.bytes().all(|b| b == b'0');
    if !bascule {
        return Err(contradiction());
    }
    Ok(format!("{ancien}{}", "9".repeat(ajout)))
}
