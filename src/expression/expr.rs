// src/expression/expr.rs
//
// AST d’une expression saisie, puis évaluation en réel constructif.
// - Nombre : décimal exact
// - Resultat : valeur d’une autre expression, fournie par le résolveur
// - mode degrés : conversion à l’entrée des fonctions trigonométriques
//   et à la sortie de leurs réciproques

use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;

use super::jetons::{Constante, Fonction};
use super::Resolveur;
use crate::erreur::ErreurCalcul;
use crate::reel::{Annulation, Reel};

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Nombre(BigRational),
    Constante(Constante),
    Resultat(i64),

    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Puissance(Box<Expr>, Box<Expr>),

    Fonction(Fonction, Box<Expr>),
}

/// Ce dont l’évaluation a besoin en plus de l’arbre.
pub struct Contexte<'a> {
    pub degres: bool,
    pub resolveur: &'a dyn Resolveur,
    pub annul: &'a Annulation,
}

/// π/180 : un degré en radians.
fn degre() -> Reel {
    Reel::multiple_pi(BigRational::new(BigInt::from(1), BigInt::from(180)))
}

impl Expr {
    /// Construit le réel. Rien n’est approché ici, sauf pour décider
    /// quelques cas de domaine (base nulle d’une puissance).
    pub fn evalue(&self, ctx: &Contexte<'_>) -> Result<Reel, ErreurCalcul> {
        ctx.annul.verifie()?;

        match self {
            Expr::Nombre(q) => Ok(Reel::rationnel(q.clone())),
            Expr::Constante(Constante::Pi) => Ok(Reel::pi()),
            Expr::Constante(Constante::E) => Ok(Reel::un().exp()),
            Expr::Resultat(i) => ctx.resolveur.valeur(*i, ctx.annul),

            Expr::Neg(a) => Ok(a.evalue(ctx)?.neg()),
            Expr::Add(a, b) => Ok(a.evalue(ctx)?.add(&b.evalue(ctx)?)),
            Expr::Sub(a, b) => Ok(a.evalue(ctx)?.sub(&b.evalue(ctx)?)),
            Expr::Mul(a, b) => Ok(a.evalue(ctx)?.mul(&b.evalue(ctx)?)),
            Expr::Div(a, b) => a.evalue(ctx)?.div(&b.evalue(ctx)?),
            Expr::Puissance(a, b) => a.evalue(ctx)?.puissance(&b.evalue(ctx)?),

            Expr::Fonction(f, a) => {
                let mut x = a.evalue(ctx)?;
                if ctx.degres && f.prend_un_angle() {
                    x = x.mul(&degre());
                }
                let y = match f {
                    Fonction::Sin => x.sin(),
                    Fonction::Cos => x.cos(),
                    Fonction::Tan => x.tan()?,
                    Fonction::Asin => x.asin()?,
                    Fonction::Acos => x.acos()?,
                    Fonction::Atan => x.atan()?,
                    Fonction::Ln => x.ln()?,
                    Fonction::Log => x.log10()?,
                    Fonction::Exp => x.exp(),
                    Fonction::Racine => x.sqrt()?,
                };
                if ctx.degres && f.rend_un_angle() {
                    return y.div(&degre());
                }
                Ok(y)
            }
        }
    }
}

/* ------------------------ Affichage ------------------------ */

fn prec(e: &Expr) -> u8 {
    match e {
        Expr::Add(..) | Expr::Sub(..) => 1,
        Expr::Mul(..) | Expr::Div(..) => 2,
        Expr::Neg(_) => 3,
        Expr::Puissance(..) => 4,
        _ => 5,
    }
}

fn ecrit(f: &mut fmt::Formatter<'_>, e: &Expr, min: u8) -> fmt::Result {
    if prec(e) < min {
        write!(f, "(")?;
        ecrit(f, e, 0)?;
        return write!(f, ")");
    }
    match e {
        Expr::Nombre(q) => write!(f, "{q}"),
        Expr::Constante(Constante::Pi) => write!(f, "π"),
        Expr::Constante(Constante::E) => write!(f, "e"),
        Expr::Resultat(i) => write!(f, "#{i}"),
        Expr::Neg(a) => {
            write!(f, "-")?;
            ecrit(f, a, 3)
        }
        Expr::Add(a, b) => {
            ecrit(f, a, 1)?;
            write!(f, "+")?;
            ecrit(f, b, 2)
        }
        Expr::Sub(a, b) => {
            ecrit(f, a, 1)?;
            write!(f, "-")?;
            ecrit(f, b, 2)
        }
        Expr::Mul(a, b) => {
            ecrit(f, a, 2)?;
            write!(f, "×")?;
            ecrit(f, b, 3)
        }
        Expr::Div(a, b) => {
            ecrit(f, a, 2)?;
            write!(f, "÷")?;
            ecrit(f, b, 3)
        }
        // ^ associatif à droite
        Expr::Puissance(a, b) => {
            ecrit(f, a, 5)?;
            write!(f, "^")?;
            ecrit(f, b, 4)
        }
        Expr::Fonction(fct, a) => {
            write!(f, "{}(", fct.nom())?;
            ecrit(f, a, 0)?;
            write!(f, ")")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ecrit(f, self, 0)
    }
}
