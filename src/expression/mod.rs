//! Expression saisie
//!
//! Organisation interne :
//! - jetons.rs : touches saisies, découpage texte -> jetons, lexèmes
//! - rpn.rs    : shunting-yard + construction Expr
//! - expr.rs   : AST + évaluation en réel constructif
//!
//! Le moteur ne voit qu’une `Expression` : évaluable (mode d’angle + résolveur)
//! et sérialisable.

pub mod expr;
pub mod jetons;
pub mod rpn;

use serde::{Deserialize, Serialize};

use crate::erreur::{ErreurCalcul, ErreurStock};
use crate::reel::{Annulation, Reel};

pub use expr::Expr;
pub use jetons::{Constante, Fonction, Jeton};

/// Donne la valeur d’une autre expression (référence `#n`).
pub trait Resolveur: Send + Sync {
    fn valeur(&self, index: i64, annul: &Annulation) -> Result<Reel, ErreurCalcul>;
}

/// Résolveur vide : toute référence est une erreur de syntaxe.
pub struct SansReference;

impl Resolveur for SansReference {
    fn valeur(&self, index: i64, _annul: &Annulation) -> Result<Reel, ErreurCalcul> {
        Err(ErreurCalcul::Syntaxe(format!("référence inconnue: #{index}")))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression {
    jetons: Vec<Jeton>,
}

impl Expression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depuis_texte(s: &str) -> Result<Self, ErreurCalcul> {
        Ok(Self {
            jetons: jetons::depuis_texte(s)?,
        })
    }

    pub fn jetons(&self) -> &[Jeton] {
        &self.jetons
    }

    pub fn ajoute(&mut self, j: Jeton) {
        self.jetons.push(j);
    }

    pub fn supprime_dernier(&mut self) -> Option<Jeton> {
        self.jetons.pop()
    }

    pub fn efface(&mut self) {
        self.jetons.clear();
    }

    pub fn est_vide(&self) -> bool {
        self.jetons.is_empty()
    }

    /// Se termine par un opérateur binaire ou une parenthèse encore ouverte :
    /// l’expression attend un opérande.
    pub fn a_operateur_final(&self) -> bool {
        matches!(
            self.jetons.last(),
            Some(j) if j.est_operateur() || matches!(j, Jeton::Fonction(_) | Jeton::ParOuvrante)
        )
    }

    /// Index référencés (#n), dans l’ordre de saisie.
    pub fn references(&self) -> Vec<i64> {
        self.jetons
            .iter()
            .filter_map(|j| match j {
                Jeton::Resultat(i) => Some(*i),
                _ => None,
            })
            .collect()
    }

    pub fn texte(&self) -> String {
        self.jetons.iter().map(Jeton::texte).collect()
    }

    /// Arbre syntaxique (jetons -> lexèmes -> RPN -> Expr).
    pub fn arbre(&self) -> Result<Expr, ErreurCalcul> {
        if self.est_vide() {
            return Err(ErreurCalcul::Syntaxe("expression vide".into()));
        }
        let toks = jetons::lexemes(&self.jetons)?;
        let rpn = rpn::to_rpn(&toks)?;
        rpn::from_rpn(&rpn)
    }

    pub fn evalue(
        &self,
        degres: bool,
        resolveur: &dyn Resolveur,
        annul: &Annulation,
    ) -> Result<Reel, ErreurCalcul> {
        let arbre = self.arbre()?;
        let ctx = expr::Contexte {
            degres,
            resolveur,
            annul,
        };
        arbre.evalue(&ctx)
    }

    pub fn serialise(&self) -> Result<Vec<u8>, ErreurStock> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialise(octets: &[u8]) -> Result<Self, ErreurStock> {
        Ok(serde_json::from_slice(octets)?)
    }
}
