//! src/moteur/ecouteur.rs
//!
//! Interfaces avec l’extérieur du moteur :
//! - `Ecouteur` : notifications (appelées sur le fil d’orchestration, dans `pompe()`)
//! - `LargeurAffichage` : budget de caractères de l’afficheur (appelable depuis les fils de calcul)

use crate::erreur::ErreurCalcul;

/// Famille d’erreur remontée à l’écouteur.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeErreur {
    Syntaxe,
    Domaine,
    Precision,
}

impl TypeErreur {
    /// `None` pour une annulation (elle n’est pas une erreur).
    pub fn depuis(e: &ErreurCalcul) -> Option<TypeErreur> {
        match e {
            ErreurCalcul::Syntaxe(_) => Some(TypeErreur::Syntaxe),
            ErreurCalcul::Domaine(_) => Some(TypeErreur::Domaine),
            ErreurCalcul::DepassementPrecision => Some(TypeErreur::Precision),
            ErreurCalcul::Annule => None,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            TypeErreur::Syntaxe => "Expression mal formée",
            TypeErreur::Domaine => "Hors domaine",
            TypeErreur::Precision => "Précision insuffisante",
        }
    }
}

/// Position du dernier chiffre non nul (chiffres après la virgule ; ≤ 0 pour un entier).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChiffreFaible {
    /// La valeur est un zéro reconnu.
    Zero,
    Position(i32),
    /// Développement infini ou inconnu.
    Inconnu,
}

pub trait Ecouteur {
    /// Première évaluation réussie : offset calculé pour l’affichage, index du premier
    /// chiffre significatif dans la chaîne en cache, dernier chiffre non nul, partie entière.
    fn on_evalue(
        &mut self,
        index: i64,
        offset: i32,
        msd: Option<usize>,
        lsd: ChiffreFaible,
        partie_entiere: &str,
    );

    fn on_erreur(&mut self, index: i64, erreur: TypeErreur);

    /// Retour silencieux à l’état d’avant la requête.
    fn on_annule(&mut self, index: i64);

    /// De nouveaux chiffres sont en cache.
    fn on_raffine(&mut self, index: i64);

    /// Délai dépassé sur une requête explicite : proposer un délai plus long (une fois).
    fn propose_delai_long(&mut self, _index: i64) {}

    /// Annulation demandée bruyamment (message à l’utilisateur).
    fn signale_annulation(&mut self, _index: i64) {}
}

/// Budget de caractères de l’afficheur.
pub trait LargeurAffichage: Send + Sync {
    fn caracteres_max(&self) -> usize;

    /// Coût (en caractères) des séparateurs de groupes de la partie entière,
    /// `longueur_entiere` étant la position du point décimal dans `chiffres`.
    fn cout_separateurs(&self, chiffres: &str, longueur_entiere: usize) -> f32;

    /// Caractères gagnés quand aucun point de suspension n’est affiché.
    fn credit_sans_ellipse(&self) -> f32;

    /// Caractères gagnés par un point décimal plus étroit qu’un chiffre.
    fn credit_point_decimal(&self) -> f32;
}

/// Afficheur à chasse fixe, sans séparateurs.
#[derive(Clone, Copy, Debug)]
pub struct LargeurFixe(pub usize);

impl LargeurAffichage for LargeurFixe {
    fn caracteres_max(&self) -> usize {
        self.0
    }

    fn cout_separateurs(&self, _chiffres: &str, _longueur_entiere: usize) -> f32 {
        0.0
    }

    fn credit_sans_ellipse(&self) -> f32 {
        0.0
    }

    fn credit_point_decimal(&self) -> f32 {
        0.0
    }
}

/// Séparateurs de milliers (espaces fines) dans la partie entière.
#[derive(Clone, Copy, Debug)]
pub struct SeparateursMilliers {
    pub caracteres: usize,
    /// Largeur d’un séparateur, en fraction de chiffre.
    pub largeur_separateur: f32,
    pub credit_ellipse: f32,
    pub credit_point: f32,
}

impl LargeurAffichage for SeparateursMilliers {
    fn caracteres_max(&self) -> usize {
        self.caracteres
    }

    fn cout_separateurs(&self, chiffres: &str, longueur_entiere: usize) -> f32 {
        let nb_chiffres = chiffres
            .chars()
            .take(longueur_entiere)
            .filter(char::is_ascii_digit)
            .count();
        let groupes = nb_chiffres.saturating_sub(1) / 3;
        groupes as f32 * self.largeur_separateur
    }

    fn credit_sans_ellipse(&self) -> f32 {
        self.credit_ellipse
    }

    fn credit_point_decimal(&self) -> f32 {
        self.credit_point
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separateurs_de_la_partie_entiere() {
        let l = SeparateursMilliers {
            caracteres: 16,
            largeur_separateur: 0.5,
            credit_ellipse: 1.0,
            credit_point: 0.5,
        };
        assert_eq!(l.cout_separateurs("-1234567.25", 8), 1.0);
        assert_eq!(l.cout_separateurs("999.0", 3), 0.0);
        assert_eq!(LargeurFixe(10).cout_separateurs("1234567.0", 7), 0.0);
    }

    #[test]
    fn types_d_erreur() {
        assert_eq!(
            TypeErreur::depuis(&ErreurCalcul::Domaine("x".into())),
            Some(TypeErreur::Domaine)
        );
        assert_eq!(TypeErreur::depuis(&ErreurCalcul::Annule), None);
    }
}
