//! src/moteur/calcul.rs
//!
//! Corps des tâches de fond (exécutés hors du fil d’orchestration).
//! Ils ne touchent à aucune fiche : ils lisent un instantané et rendent un message.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use super::ecouteur::{ChiffreFaible, LargeurAffichage};
use super::fiche::{publie, CelluleValeur};
use super::precision::{
    index_msd, offset_chiffre_faible, offset_prefere, CHIFFRES_EN_RESERVE, LOG2_10,
};
use crate::erreur::ErreurCalcul;
use crate::expression::{Expression, Resolveur};
use crate::reel::{Annulation, Reel};

/* ------------------------ Résolveur ------------------------ */

/// Ce qu’il faut pour évaluer une expression référencée.
pub(crate) struct Source {
    pub expression: Arc<Expression>,
    pub degres: bool,
    pub valeur: CelluleValeur,
}

/// Instantané des expressions référencées, pris sur le fil d’orchestration.
/// Une référence sans valeur publiée est évaluée (puis publiée) à la demande.
#[derive(Default)]
pub(crate) struct ResolveurInstantane {
    sources: HashMap<i64, Source>,
    en_cours: Mutex<HashSet<i64>>,
}

impl ResolveurInstantane {
    pub fn ajoute(&mut self, index: i64, source: Source) {
        self.sources.insert(index, source);
    }

    pub fn contient(&self, index: i64) -> bool {
        self.sources.contains_key(&index)
    }
}

impl Resolveur for ResolveurInstantane {
    fn valeur(&self, index: i64, annul: &Annulation) -> Result<Reel, ErreurCalcul> {
        let source = self
            .sources
            .get(&index)
            .ok_or_else(|| ErreurCalcul::Syntaxe(format!("référence inconnue: #{index}")))?;
        if let Some(v) = source.valeur.get() {
            return Ok(v.clone());
        }

        let entre = self
            .en_cours
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index);
        if !entre {
            return Err(ErreurCalcul::Syntaxe(format!("référence circulaire: #{index}")));
        }
        let r = source.expression.evalue(source.degres, self, annul);
        self.en_cours
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&index);

        Ok(publie(&source.valeur, r?))
    }
}

/* ------------------------ Évaluation initiale ------------------------ */

pub(crate) struct ParamsInitial {
    pub expression: Arc<Expression>,
    pub degres: bool,
    pub valeur: CelluleValeur,
    pub resolveur: ResolveurInstantane,
    pub largeur: Arc<dyn LargeurAffichage>,
    pub precision_initiale: i32,
    pub offset_msd_max: i32,
    pub bits_max: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResultatInitial {
    pub chiffres: String,
    pub offset: i32,
    pub offset_affichage: i32,
    pub msd: Option<usize>,
    pub lsd: ChiffreFaible,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Echec {
    Calcul(ErreurCalcul),
    /// Partie entière trop grande pour le plafond de bits : traité comme un délai dépassé.
    TropGrand,
}

impl From<ErreurCalcul> for Echec {
    fn from(e: ErreurCalcul) -> Self {
        Echec::Calcul(e)
    }
}

fn index_point(chiffres: &str) -> usize {
    chiffres.find('.').unwrap_or(chiffres.len())
}

/// Première évaluation : valeur (publiée une fois), contrôle de taille, troncature,
/// recherche du premier chiffre significatif, puis précision préférée.
pub(crate) fn calcul_initial(
    p: &ParamsInitial,
    annul: &Annulation,
) -> Result<ResultatInitial, Echec> {
    let valeur = match p.valeur.get() {
        Some(v) => v.clone(),
        None => {
            let v = p.expression.evalue(p.degres, &p.resolveur, annul)?;
            publie(&p.valeur, v)
        }
    };

    let bits = valeur.bits_partie_entiere(annul)?;
    if bits > p.bits_max {
        tracing::warn!(bits, plafond = p.bits_max, "partie entière trop grande");
        return Err(Echec::TropGrand);
    }

    let mut offset = p.precision_initiale;
    let mut chiffres = valeur.to_string_tronquee(offset, annul)?;
    let mut msd = index_msd(&chiffres);

    if msd.is_none() && !valeur.est_zero_certain() {
        let limite_bits = (p.offset_msd_max as f64 * LOG2_10).ceil() as u32;
        let zeros = valeur.borne_zeros_tete(limite_bits, annul)?;
        offset = if zeros < limite_bits {
            let chiffres_nuls = (zeros as f64 / LOG2_10).ceil() as i32;
            (30 + chiffres_nuls).clamp(offset, p.offset_msd_max)
        } else {
            p.offset_msd_max
        };
        tracing::debug!(zeros, offset, "recherche du premier chiffre significatif");
        chiffres = valeur.to_string_tronquee(offset, annul)?;
        msd = index_msd(&chiffres);
        if msd.is_none() && offset < p.offset_msd_max {
            offset = p.offset_msd_max;
            chiffres = valeur.to_string_tronquee(offset, annul)?;
            msd = index_msd(&chiffres);
        }
    }

    let lsd = offset_chiffre_faible(&valeur, &chiffres, index_point(&chiffres));
    let offset_affichage = offset_prefere(&chiffres, msd, lsd, p.largeur.as_ref());
    let voulu = offset_affichage + CHIFFRES_EN_RESERVE;
    if voulu > offset {
        offset = voulu;
        chiffres = valeur.to_string_tronquee(offset, annul)?;
        msd = index_msd(&chiffres).or(msd);
    }

    Ok(ResultatInitial {
        chiffres,
        offset,
        offset_affichage,
        msd,
        lsd,
    })
}

/// Raffinement : seulement une nouvelle troncature de la valeur déjà publiée.
pub(crate) fn calcul_raffinement(
    valeur: &Reel,
    offset: i32,
    annul: &Annulation,
) -> Result<String, ErreurCalcul> {
    valeur.to_string_tronquee(offset, annul)
}
