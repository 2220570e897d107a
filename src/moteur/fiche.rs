//! src/moteur/fiche.rs
//!
//! Une fiche par index d’expression : l’expression, ses réglages, la valeur réelle
//! (cellule à affectation unique, partagée avec les fils de calcul) et les chiffres
//! en cache. Seul le fil d’orchestration touche aux champs de la fiche ; un fil de calcul
//! n’écrit que dans la cellule de valeur.

use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Instant;

use super::ecouteur::ChiffreFaible;
use super::stock::Ligne;
use crate::erreur::ErreurStock;
use crate::expression::Expression;
use crate::reel::{Annulation, Reel};

/// Cellule de valeur : le premier qui écrit gagne, les autres relisent.
pub type CelluleValeur = Arc<OnceLock<Reel>>;

pub fn nouvelle_cellule() -> CelluleValeur {
    Arc::new(OnceLock::new())
}

/// Publie `v` dans la cellule ; si un autre fil a gagné, rend sa valeur.
pub fn publie(cellule: &OnceLock<Reel>, v: Reel) -> Reel {
    cellule.get_or_init(|| v).clone()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Genre {
    Initiale { requise: bool },
    Raffinement,
}

/// Tâche de fond active sur une fiche (au plus une).
#[derive(Debug)]
pub struct Tache {
    pub id: u64,
    pub genre: Genre,
    pub annul: Annulation,
    pub echeance: Option<Instant>,
    pub fil: Option<JoinHandle<()>>,
}

/// Résultat d’une première évaluation réussie, gardé pour répondre depuis le cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Apercu {
    pub offset_affichage: i32,
    pub msd: Option<usize>,
    pub lsd: ChiffreFaible,
}

#[derive(Debug)]
pub struct Fiche {
    /// Partagée (lecture seule) avec les fils de calcul ; une édition copie d’abord.
    pub expression: Arc<Expression>,
    pub degres: bool,
    pub delai_long: bool,
    pub valeur: CelluleValeur,

    pub chiffres: Option<String>,
    /// Chiffres après la virgule dans `chiffres` ; ne décroît jamais tant que la valeur ne change pas.
    pub offset_cache: i32,
    /// Offset demandé à la tâche en cours (≥ offset_cache).
    pub offset_demande: i32,
    pub apercu: Option<Apercu>,

    /// millisecondes depuis l’époque Unix
    pub horodatage: i64,
    pub tache: Option<Tache>,
    /// L’expression a changé depuis la dernière évaluation (fiche courante).
    pub modifiee: bool,
}

impl Fiche {
    pub fn nouvelle(expression: Expression, degres: bool) -> Fiche {
        Fiche {
            expression: Arc::new(expression),
            degres,
            delai_long: false,
            valeur: nouvelle_cellule(),
            chiffres: None,
            offset_cache: 0,
            offset_demande: 0,
            apercu: None,
            horodatage: chrono::Utc::now().timestamp_millis(),
            tache: None,
            modifiee: true,
        }
    }

    /// Réhydrate une fiche depuis une ligne du stock.
    pub fn depuis_ligne(ligne: &Ligne) -> Result<Fiche, ErreurStock> {
        let expression = Expression::deserialise(&ligne.expression)?;
        Ok(Fiche {
            delai_long: ligne.delai_long,
            horodatage: ligne.horodatage,
            modifiee: false,
            ..Fiche::nouvelle(expression, ligne.degres)
        })
    }

    pub fn vers_ligne(&self) -> Result<Ligne, ErreurStock> {
        Ok(Ligne {
            expression: self.expression.serialise()?,
            degres: self.degres,
            delai_long: self.delai_long,
            horodatage: self.horodatage,
        })
    }

    /// Copie immuable : même expression, même cellule de valeur, mêmes chiffres ; pas de tâche.
    pub fn instantane(&self) -> Fiche {
        Fiche {
            expression: Arc::clone(&self.expression),
            degres: self.degres,
            delai_long: self.delai_long,
            valeur: Arc::clone(&self.valeur),
            chiffres: self.chiffres.clone(),
            offset_cache: self.offset_cache,
            offset_demande: self.offset_cache,
            apercu: self.apercu.clone(),
            horodatage: chrono::Utc::now().timestamp_millis(),
            tache: None,
            modifiee: false,
        }
    }

    pub fn valeur_publiee(&self) -> bool {
        self.valeur.get().is_some()
    }

    /// Oublie tout ce qui dépend de l’expression (valeur comprise).
    pub fn oublie_valeur(&mut self) {
        self.valeur = nouvelle_cellule();
        self.oublie_chiffres();
        self.modifiee = true;
    }

    /// Oublie les chiffres en cache, garde la valeur.
    pub fn oublie_chiffres(&mut self) {
        self.chiffres = None;
        self.offset_cache = 0;
        self.offset_demande = 0;
        self.apercu = None;
    }

    /// Édition de l’expression (fiche courante) : copie si un fil la lit encore.
    pub fn edite(&mut self, f: impl FnOnce(&mut Expression)) {
        f(Arc::make_mut(&mut self.expression));
        self.oublie_valeur();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Jeton;

    #[test]
    fn premiere_ecriture_gagne() {
        let c = nouvelle_cellule();
        let a = publie(&c, Reel::entier(1));
        let b = publie(&c, Reel::entier(2));
        assert_eq!(a.rationnel_exact(), b.rationnel_exact());
        assert_eq!(c.get().and_then(Reel::rationnel_exact), Reel::entier(1).rationnel_exact());
    }

    #[test]
    fn edition_copie_l_expression_partagee() {
        let mut f = Fiche::nouvelle(Expression::depuis_texte("1+2").unwrap(), false);
        let lue_par_un_fil = Arc::clone(&f.expression);
        let cellule = Arc::clone(&f.valeur);
        f.edite(|e| e.ajoute(Jeton::Chiffre(3)));
        assert_eq!(lue_par_un_fil.texte(), "1+2");
        assert_eq!(f.expression.texte(), "1+23");
        // nouvelle cellule : une publication tardive dans l’ancienne ne touche pas la fiche
        publie(&cellule, Reel::entier(3));
        assert!(!f.valeur_publiee());
        assert!(f.modifiee);
    }

    #[test]
    fn aller_retour_par_le_stock() {
        let mut f = Fiche::nouvelle(Expression::depuis_texte("sin(30)").unwrap(), true);
        f.delai_long = true;
        let l = f.vers_ligne().unwrap();
        let g = Fiche::depuis_ligne(&l).unwrap();
        assert_eq!(g.expression, f.expression);
        assert!(g.degres && g.delai_long);
        assert_eq!(g.horodatage, f.horodatage);
        assert!(!g.modifiee);
    }
}
