//! src/app/etat.rs
//!
//! État UI (sans rendu).
//!
//! Rôle : relier la saisie au moteur d’évaluation et recevoir ses notifications.
//! `Affichage` est l’écouteur du moteur ; `AppCalc` tient l’entrée, les réglages et
//! la liste des index d’historique.
//!
//! Contrats :
//! - Aucune évaluation sur le fil de l’UI : tout passe par des requêtes au moteur.
//! - Le moteur n’appelle l’écouteur que depuis `pompe()`, donc ici.
//! - Défense en profondeur : bornes sur le nombre de chiffres demandés.

use std::collections::{HashMap, HashSet};

use calculatrice_reels::expression::Expression;
use calculatrice_reels::moteur::{
    ChiffreFaible, Ecouteur, Evaluateur, TypeErreur, INDEX_COURANT,
};

/// Chiffres après la virgule affichés par défaut pour un développement infini.
const DIGITS_DEFAUT: usize = 20;

/// Garde-fou : on borne la précision (anti-gel).
const DIGITS_MAX: usize = 2000;

/// Dernière évaluation réussie d’une fiche.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resultat {
    pub offset: i32,
    pub msd: Option<usize>,
    pub lsd: ChiffreFaible,
    pub partie_entiere: String,
}

/// Écouteur du moteur : garde de quoi dessiner la prochaine image.
#[derive(Debug, Default)]
pub struct Affichage {
    pub resultats: HashMap<i64, Resultat>,
    pub erreur: String,
    pub message: String,
    pub proposition_delai: bool,
}

impl Ecouteur for Affichage {
    fn on_evalue(
        &mut self,
        index: i64,
        offset: i32,
        msd: Option<usize>,
        lsd: ChiffreFaible,
        partie_entiere: &str,
    ) {
        if index == INDEX_COURANT {
            self.erreur.clear();
        }
        self.resultats.insert(
            index,
            Resultat {
                offset,
                msd,
                lsd,
                partie_entiere: partie_entiere.to_string(),
            },
        );
    }

    fn on_erreur(&mut self, index: i64, erreur: TypeErreur) {
        self.resultats.remove(&index);
        if index == INDEX_COURANT {
            self.erreur = erreur.message().to_string();
        }
    }

    fn on_annule(&mut self, index: i64) {
        self.resultats.remove(&index);
    }

    fn on_raffine(&mut self, index: i64) {
        tracing::trace!(index, "chiffres supplémentaires");
    }

    fn propose_delai_long(&mut self, _index: i64) {
        self.proposition_delai = true;
    }

    fn signale_annulation(&mut self, _index: i64) {
        self.message = "Calcul annulé".into();
    }
}

pub struct AppCalc {
    pub moteur: Evaluateur,
    pub affichage: Affichage,

    // --- entrée utilisateur ---
    pub entree: String,
    derniere_entree: String,

    // --- paramètres ---
    pub digits: usize,
    pub degres: bool,

    // --- historique (index positifs du stock) ---
    pub historique: Vec<i64>,
    demandes: HashSet<i64>,

    /// "=" pressé, en attente du résultat pour figer l’expression.
    egal_en_attente: bool,

    // --- UX ---
    pub focus_entree: bool,
}

impl AppCalc {
    pub fn new(mut moteur: Evaluateur) -> Self {
        let historique = match (moteur.index_min(), moteur.index_max()) {
            (Ok(min), Ok(max)) if min > 0 => (min..=max).collect(),
            (Ok(_), Ok(_)) => Vec::new(),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(erreur = %e, "historique illisible");
                Vec::new()
            }
        };
        tracing::info!(entrees = historique.len(), "historique chargé");

        Self {
            moteur,
            affichage: Affichage::default(),
            entree: String::new(),
            derniere_entree: String::new(),
            digits: DIGITS_DEFAUT,
            degres: false,
            historique,
            demandes: HashSet::new(),
            egal_en_attente: false,
            focus_entree: true,
        }
    }

    /* ------------------------ Moteur ------------------------ */

    /// Publie les résultats arrivés ; fige la courante si "=" attendait ce résultat.
    pub fn pompe(&mut self) {
        self.moteur.pompe(&mut self.affichage);

        if !self.egal_en_attente {
            return;
        }
        if self.affichage.resultats.contains_key(&INDEX_COURANT) {
            self.egal_en_attente = false;
            match self.moteur.fige_courant(true) {
                Ok(index) => {
                    if let Some(r) = self.affichage.resultats.get(&INDEX_COURANT).cloned() {
                        self.affichage.resultats.insert(index, r);
                    }
                    self.historique.push(index);
                }
                Err(e) => {
                    tracing::error!(erreur = %e, "impossible d’ajouter à l’historique");
                    self.affichage.message = "Historique indisponible".into();
                }
            }
        } else if !self.moteur.en_cours(INDEX_COURANT) {
            // erreur, délai dépassé ou annulation
            self.egal_en_attente = false;
        }
    }

    pub fn calcul_en_cours(&self) -> bool {
        self.moteur.taches_actives() > 0
    }

    /// Recopie l’entrée texte dans la fiche courante si elle a changé,
    /// puis lance une évaluation facultative.
    pub fn saisie_modifiee(&mut self) {
        if self.entree == self.derniere_entree {
            return;
        }
        self.derniere_entree = self.entree.clone();
        self.affichage.erreur.clear();
        self.affichage.message.clear();
        self.affichage.proposition_delai = false;
        self.affichage.resultats.remove(&INDEX_COURANT);
        self.egal_en_attente = false;

        match Expression::depuis_texte(&self.entree) {
            Ok(e) => {
                let evaluable = !e.est_vide() && !e.a_operateur_final();
                self.moteur.remplace_courant(e);
                if evaluable {
                    self.moteur
                        .requete_initiale(INDEX_COURANT, false, &mut self.affichage);
                }
            }
            Err(_) => self.moteur.remplace_courant(Expression::new()),
        }
    }

    /// "=" : évaluation requise, puis ajout à l’historique.
    pub fn egal(&mut self) {
        self.saisie_modifiee();
        if self.entree.trim().is_empty() {
            self.affichage.erreur = "Entrée vide".into();
            return;
        }
        if Expression::depuis_texte(&self.entree).is_err() {
            self.affichage.erreur = TypeErreur::Syntaxe.message().into();
            return;
        }
        self.affichage.message.clear();
        self.egal_en_attente = true;
        self.moteur
            .requete_initiale(INDEX_COURANT, true, &mut self.affichage);
    }

    /// Accepte la proposition d’un délai plus long et relance.
    pub fn delai_plus_long(&mut self) {
        self.affichage.proposition_delai = false;
        self.moteur.prolonge_delai();
        self.egal();
    }

    pub fn annule_calcul(&mut self) {
        self.egal_en_attente = false;
        self.moteur
            .annule(INDEX_COURANT, false, &mut self.affichage);
    }

    /// Chiffres à montrer pour `index` : l’offset préféré, prolongé jusqu’à `digits`
    /// quand le développement ne s’arrête pas.
    pub fn chiffres(&mut self, index: i64) -> Option<(String, Resultat)> {
        let r = self.affichage.resultats.get(&index)?.clone();
        let voulu = match r.lsd {
            ChiffreFaible::Inconnu => r.offset.max(self.digits as i32),
            _ => r.offset,
        };
        let s = self.moteur.chiffres(index, voulu, &mut self.affichage)?;
        Some((s, r))
    }

    /// Demande (une seule fois) l’évaluation d’une entrée d’historique.
    pub fn demande_historique(&mut self, index: i64) {
        if self.affichage.resultats.contains_key(&index) || !self.demandes.insert(index) {
            return;
        }
        self.moteur.requete_initiale(index, false, &mut self.affichage);
    }

    pub fn texte_historique(&mut self, index: i64) -> String {
        match self.moteur.fiche(index) {
            Ok(f) => f.expression.texte(),
            Err(e) => format!("({e})"),
        }
    }

    /* ------------------------ Actions “boutons” ------------------------ */

    /// AC : remise à zéro totale (entrée + messages + digits par défaut).
    pub fn reset_total(&mut self) {
        self.clear_entree();
        self.affichage.message.clear();
        self.digits = DIGITS_DEFAUT;
    }

    /// C : effacer l’entrée (et la fiche courante).
    pub fn clear_entree(&mut self) {
        self.entree.clear();
        self.derniere_entree.clear();
        self.egal_en_attente = false;
        self.affichage.erreur.clear();
        self.affichage.proposition_delai = false;
        self.affichage.resultats.remove(&INDEX_COURANT);
        self.moteur.efface_courant();
        self.focus_entree = true;
    }

    /// Insère une référence au résultat d’une entrée d’historique.
    pub fn reutilise(&mut self, index: i64) {
        if !self.entree.is_empty() && !self.entree.ends_with(char::is_whitespace) {
            self.entree.push(' ');
        }
        self.entree.push_str(&format!("#{index}"));
        self.focus_entree = true;
    }

    pub fn efface_historique(&mut self) {
        match self.moteur.efface_historique() {
            Ok(()) => {
                for i in self.historique.drain(..) {
                    self.affichage.resultats.remove(&i);
                }
                self.demandes.clear();
            }
            Err(e) => {
                tracing::error!(erreur = %e, "effacement de l’historique");
                self.affichage.message = "Effacement impossible".into();
            }
        }
    }

    pub fn set_degres(&mut self, degres: bool) {
        self.degres = degres;
        self.moteur.set_mode_degres(degres);
        self.affichage.resultats.remove(&INDEX_COURANT);
        let e = &self.moteur.courante().expression;
        if !e.est_vide() && !e.a_operateur_final() {
            self.moteur
                .requete_initiale(INDEX_COURANT, false, &mut self.affichage);
        }
    }

    /// Garde-fou : limite digits (évite abus / gel).
    pub fn set_digits(&mut self, digits: usize) {
        self.digits = digits.clamp(0, DIGITS_MAX);
        self.focus_entree = true;
    }
}

impl Drop for AppCalc {
    fn drop(&mut self) {
        if let Err(e) = self.moteur.ferme() {
            tracing::warn!(erreur = %e, "fermeture du moteur");
        }
    }
}
