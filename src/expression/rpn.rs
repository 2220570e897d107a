// src/expression/rpn.rs
//
// Jetons lexicaux -> notation postfixe (aiguillage de Dijkstra) -> arbre.
//
// - une fonction est préfixe : elle quitte la pile derrière sa parenthèse fermante
// - un '-' là où un opérande est attendu devient Neg, préfixe rangé entre × ÷ et ^ :
//   "-2^2" = -(2^2), "2^-3" = 2^(-3) ; un '+' au même endroit est ignoré
// - deux valeurs qui se suivent ("2π", "3(4)", "π sin(1)") sont multipliées
// - une parenthèse orpheline est une erreur de syntaxe

use super::expr::Expr;
use super::jetons::Tok;
use crate::erreur::ErreurCalcul;

fn syntaxe(msg: &str) -> ErreurCalcul {
    ErreurCalcul::Syntaxe(msg.into())
}

/// (priorité, associatif à droite) ; `None` hors opérateurs.
fn priorite(t: &Tok) -> Option<(u8, bool)> {
    match t {
        Tok::Plus | Tok::Minus => Some((1, false)),
        Tok::Star | Tok::Slash => Some((2, false)),
        Tok::Neg => Some((3, true)),
        Tok::Caret => Some((4, true)),
        _ => None,
    }
}

fn commence_valeur(t: &Tok) -> bool {
    matches!(
        t,
        Tok::Num(_) | Tok::Constante(_) | Tok::Resultat(_) | Tok::Fonction(_) | Tok::LPar
    )
}

/// Sort de la pile les opérateurs qui lient plus fort que `tok`.
/// S’arrête sur '(' et sur une fonction.
fn reduit(tok: &Tok, pile: &mut Vec<Tok>, sortie: &mut Vec<Tok>) {
    let Some((p, droite)) = priorite(tok) else {
        return;
    };
    while let Some((q, _)) = pile.last().and_then(priorite) {
        if q < p || (q == p && droite) {
            break;
        }
        if let Some(op) = pile.pop() {
            sortie.push(op);
        }
    }
}

fn ferme_parenthese(pile: &mut Vec<Tok>, sortie: &mut Vec<Tok>) -> Result<(), ErreurCalcul> {
    loop {
        match pile.pop() {
            Some(Tok::LPar) => break,
            Some(op) => sortie.push(op),
            None => return Err(syntaxe("parenthèse fermante sans ouvrante")),
        }
    }
    if matches!(pile.last(), Some(Tok::Fonction(_))) {
        if let Some(f) = pile.pop() {
            sortie.push(f);
        }
    }
    Ok(())
}

/// Met les jetons en notation postfixe.
///
/// `sin(π÷2)` : [Fonction(Sin), LPar, Constante(Pi), Slash, Num(2), RPar]
/// devient [Constante(Pi), Num(2), Slash, Fonction(Sin)].
pub(crate) fn to_rpn(tokens: &[Tok]) -> Result<Vec<Tok>, ErreurCalcul> {
    let mut sortie = Vec::with_capacity(tokens.len());
    let mut pile: Vec<Tok> = Vec::new();
    // vrai au début, après un opérateur ou une ouvrante
    let mut attend = true;

    for tok in tokens {
        if !attend && commence_valeur(tok) {
            reduit(&Tok::Star, &mut pile, &mut sortie);
            pile.push(Tok::Star);
            attend = true;
        }

        match tok {
            Tok::Num(_) | Tok::Constante(_) | Tok::Resultat(_) => {
                sortie.push(tok.clone());
                attend = false;
            }
            Tok::Fonction(_) | Tok::LPar | Tok::Neg => {
                pile.push(tok.clone());
                attend = true;
            }
            Tok::Minus if attend => pile.push(Tok::Neg),
            Tok::Plus if attend => {}
            Tok::RPar => {
                if attend {
                    return Err(syntaxe("parenthèses vides ou opérande manquant"));
                }
                ferme_parenthese(&mut pile, &mut sortie)?;
            }
            binaire => {
                if attend {
                    return Err(syntaxe("opérande manquant"));
                }
                reduit(binaire, &mut pile, &mut sortie);
                pile.push(binaire.clone());
                attend = true;
            }
        }
    }

    if attend {
        return Err(syntaxe("expression incomplète"));
    }
    while let Some(op) = pile.pop() {
        if priorite(&op).is_none() {
            return Err(syntaxe("parenthèses non fermées"));
        }
        sortie.push(op);
    }
    Ok(sortie)
}

fn operande(pile: &mut Vec<Expr>) -> Result<Box<Expr>, ErreurCalcul> {
    pile.pop()
        .map(Box::new)
        .ok_or_else(|| syntaxe("opérande manquant"))
}

/// Reconstruit l’arbre depuis la notation postfixe.
pub(crate) fn from_rpn(rpn: &[Tok]) -> Result<Expr, ErreurCalcul> {
    let mut pile: Vec<Expr> = Vec::new();

    for tok in rpn {
        let noeud = match tok {
            Tok::Num(r) => Expr::Nombre(r.clone()),
            Tok::Constante(c) => Expr::Constante(*c),
            Tok::Resultat(i) => Expr::Resultat(*i),
            Tok::Neg => Expr::Neg(operande(&mut pile)?),
            Tok::Fonction(f) => Expr::Fonction(*f, operande(&mut pile)?),
            Tok::LPar | Tok::RPar => return Err(syntaxe("parenthèse inattendue en RPN")),
            binaire => {
                let b = operande(&mut pile)?;
                let a = operande(&mut pile)?;
                match binaire {
                    Tok::Plus => Expr::Add(a, b),
                    Tok::Minus => Expr::Sub(a, b),
                    Tok::Star => Expr::Mul(a, b),
                    Tok::Slash => Expr::Div(a, b),
                    _ => Expr::Puissance(a, b),
                }
            }
        };
        pile.push(noeud);
    }

    match pile.pop() {
        Some(e) if pile.is_empty() => Ok(e),
        _ => Err(syntaxe("expression invalide")),
    }
}
