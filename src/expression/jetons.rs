// src/expression/jetons.rs
//
// Deux niveaux de jetons :
// - Jeton : ce que l’utilisateur saisit, touche par touche (sérialisé tel quel)
// - Tok   : lexème prêt pour le shunting-yard (nombres regroupés)

use num_bigint::BigInt;
use num_rational::BigRational;
use serde::{Deserialize, Serialize};

use crate::erreur::ErreurCalcul;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fonction {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Ln,
    Log,
    Exp,
    Racine,
}

impl Fonction {
    pub const TOUTES: [Fonction; 10] = [
        Fonction::Sin,
        Fonction::Cos,
        Fonction::Tan,
        Fonction::Asin,
        Fonction::Acos,
        Fonction::Atan,
        Fonction::Ln,
        Fonction::Log,
        Fonction::Exp,
        Fonction::Racine,
    ];

    pub fn nom(self) -> &'static str {
        match self {
            Fonction::Sin => "sin",
            Fonction::Cos => "cos",
            Fonction::Tan => "tan",
            Fonction::Asin => "asin",
            Fonction::Acos => "acos",
            Fonction::Atan => "atan",
            Fonction::Ln => "ln",
            Fonction::Log => "log",
            Fonction::Exp => "exp",
            Fonction::Racine => "√",
        }
    }

    pub fn depuis_nom(nom: &str) -> Option<Fonction> {
        match nom {
            "sqrt" | "racine" => Some(Fonction::Racine),
            _ => Fonction::TOUTES.into_iter().find(|f| f.nom() == nom),
        }
    }

    /// Fonctions dont l’argument est un angle (mode degrés).
    pub fn prend_un_angle(self) -> bool {
        matches!(self, Fonction::Sin | Fonction::Cos | Fonction::Tan)
    }

    /// Fonctions dont le résultat est un angle (mode degrés).
    pub fn rend_un_angle(self) -> bool {
        matches!(self, Fonction::Asin | Fonction::Acos | Fonction::Atan)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constante {
    Pi,
    E,
}

/// Touche saisie. Une fonction inclut sa parenthèse ouvrante.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Jeton {
    Chiffre(u8),
    Point,
    Plus,
    Moins,
    Fois,
    Divise,
    Puissance,
    ParOuvrante,
    ParFermante,
    Fonction(Fonction),
    Constante(Constante),
    /// Référence au résultat d’une autre expression (par index)
    Resultat(i64),
}

impl Jeton {
    pub fn texte(&self) -> String {
        match self {
            Jeton::Chiffre(d) => d.to_string(),
            Jeton::Point => ".".into(),
            Jeton::Plus => "+".into(),
            Jeton::Moins => "-".into(),
            Jeton::Fois => "×".into(),
            Jeton::Divise => "÷".into(),
            Jeton::Puissance => "^".into(),
            Jeton::ParOuvrante => "(".into(),
            Jeton::ParFermante => ")".into(),
            Jeton::Fonction(f) => format!("{}(", f.nom()),
            Jeton::Constante(Constante::Pi) => "π".into(),
            Jeton::Constante(Constante::E) => "e".into(),
            Jeton::Resultat(i) => format!("#{i}"),
        }
    }

    /// Opérateur binaire (attend encore un opérande à droite).
    pub fn est_operateur(&self) -> bool {
        matches!(
            self,
            Jeton::Plus | Jeton::Moins | Jeton::Fois | Jeton::Divise | Jeton::Puissance
        )
    }
}

/* ------------------------ Texte -> jetons ------------------------ */

/// Découpe une chaîne en jetons de saisie.
/// Supporte:
/// - chiffres et point décimal
/// - opérateurs + - * / ^ (et × ÷ −)
/// - parenthèses ( )
/// - π ou pi, e
/// - fonctions : sin( cos( … (la parenthèse ouvrante est absorbée si présente)
/// - √ (équivaut à sqrt)
/// - #n : résultat de l’expression d’index n
pub fn depuis_texte(s: &str) -> Result<Vec<Jeton>, ErreurCalcul> {
    let mut out = Vec::new();
    let chars: Vec<char> = s.chars().collect();
    let mut i: usize = 0;

    // une fonction absorbe la parenthèse qui la suit
    let pousse_fonction = |out: &mut Vec<Jeton>, f: Fonction, i: &mut usize| {
        out.push(Jeton::Fonction(f));
        let mut j = *i;
        while j < chars.len() && chars[j].is_whitespace() {
            j += 1;
        }
        if j < chars.len() && chars[j] == '(' {
            *i = j + 1;
            true
        } else {
            false
        }
    };

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let simple = match c {
            '(' => Some(Jeton::ParOuvrante),
            ')' => Some(Jeton::ParFermante),
            '+' => Some(Jeton::Plus),
            '-' | '−' => Some(Jeton::Moins),
            '*' | '×' => Some(Jeton::Fois),
            '/' | '÷' => Some(Jeton::Divise),
            '^' => Some(Jeton::Puissance),
            '.' | ',' => Some(Jeton::Point),
            'π' => Some(Jeton::Constante(Constante::Pi)),
            _ => None,
        };
        if let Some(j) = simple {
            out.push(j);
            i += 1;
            continue;
        }

        if let Some(d) = c.to_digit(10) {
            out.push(Jeton::Chiffre(d as u8));
            i += 1;
            continue;
        }

        // Racine carrée unicode : √ (toujours suivie de sa parenthèse)
        if c == '√' {
            i += 1;
            if !pousse_fonction(&mut out, Fonction::Racine, &mut i) {
                return Err(ErreurCalcul::Syntaxe("parenthèse attendue après √".into()));
            }
            continue;
        }

        // Référence : #12
        if c == '#' {
            let start = i + 1;
            i = start;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let n: String = chars[start..i].iter().collect();
            let index = n
                .parse::<i64>()
                .map_err(|_| ErreurCalcul::Syntaxe("référence invalide après #".into()))?;
            out.push(Jeton::Resultat(index));
            continue;
        }

        // Identifiants ASCII : [a-zA-Z]+
        if c.is_ascii_alphabetic() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphabetic() {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect::<String>().to_lowercase();

            match word.as_str() {
                "pi" => out.push(Jeton::Constante(Constante::Pi)),
                "e" => out.push(Jeton::Constante(Constante::E)),
                w => {
                    let f = Fonction::depuis_nom(w).ok_or_else(|| {
                        ErreurCalcul::Syntaxe(format!("identifiant inconnu: '{w}'"))
                    })?;
                    if !pousse_fonction(&mut out, f, &mut i) {
                        return Err(ErreurCalcul::Syntaxe(format!(
                            "parenthèse attendue après {w}"
                        )));
                    }
                }
            }
            continue;
        }

        return Err(ErreurCalcul::Syntaxe(format!("caractère inattendu: '{c}'")));
    }

    Ok(out)
}

/* ------------------------ Jetons -> lexèmes ------------------------ */

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Tok {
    Num(BigRational),
    Constante(Constante),
    Resultat(i64),
    Fonction(Fonction),

    Plus,
    Minus,
    /// moins unaire (décidé par le shunting-yard)
    Neg,
    Star,
    Slash,
    Caret, // ^

    LPar,
    RPar,
}

/// Regroupe chiffres et point en nombres décimaux exacts ; une fonction
/// devient `Fonction` suivie de `LPar`.
pub(crate) fn lexemes(jetons: &[Jeton]) -> Result<Vec<Tok>, ErreurCalcul> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < jetons.len() {
        match &jetons[i] {
            Jeton::Chiffre(_) | Jeton::Point => {
                let mut chiffres = String::new();
                let mut decimales: Option<usize> = None;
                while i < jetons.len() {
                    match jetons[i] {
                        Jeton::Chiffre(d) => {
                            chiffres.push(char::from(b'0' + d.min(9)));
                            if let Some(n) = decimales.as_mut() {
                                *n += 1;
                            }
                        }
                        Jeton::Point if decimales.is_none() => decimales = Some(0),
                        Jeton::Point => {
                            return Err(ErreurCalcul::Syntaxe("deux points dans un nombre".into()))
                        }
                        _ => break,
                    }
                    i += 1;
                }
                if chiffres.is_empty() {
                    return Err(ErreurCalcul::Syntaxe("point isolé".into()));
                }
                let n = BigInt::parse_bytes(chiffres.as_bytes(), 10)
                    .ok_or_else(|| ErreurCalcul::Syntaxe("nombre invalide".into()))?;
                let d = BigInt::from(10).pow(decimales.unwrap_or(0) as u32);
                out.push(Tok::Num(BigRational::new(n, d)));
                continue;
            }
            Jeton::Plus => out.push(Tok::Plus),
            Jeton::Moins => out.push(Tok::Minus),
            Jeton::Fois => out.push(Tok::Star),
            Jeton::Divise => out.push(Tok::Slash),
            Jeton::Puissance => out.push(Tok::Caret),
            Jeton::ParOuvrante => out.push(Tok::LPar),
            Jeton::ParFermante => out.push(Tok::RPar),
            Jeton::Fonction(f) => {
                out.push(Tok::Fonction(*f));
                out.push(Tok::LPar);
            }
            Jeton::Constante(c) => out.push(Tok::Constante(*c)),
            Jeton::Resultat(index) => out.push(Tok::Resultat(*index)),
        }
        i += 1;
    }

    Ok(out)
}
