//! src/moteur/stock.rs
//!
//! Stock durable des expressions figées.
//!
//! - `StockDurable` : ce dont la table a besoin (ajout, lecture, effacement, bornes)
//! - `StockSqlite` : SQLite, avec un fil d’écriture ; l’index est attribué tout de suite,
//!   l’INSERT part dans la file. Les lectures passent par la même file : elles voient
//!   toujours les écritures précédentes.
//!
//! Index : 1, 2, … pour les lignes visibles dans l’historique ; -2, -3, … pour les autres.
//! -1 est réservé au miroir de l’expression courante (jamais écrit ici).
//! Les prochains index sont gardés dans la table `compteurs`, que l’effacement ne touche pas.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use rusqlite::{params, Connection, OptionalExtension};

use crate::erreur::ErreurStock;

/// Premier index attribué aux lignes non visibles.
pub const PREMIER_INDEX_CACHE: i64 = -2;

const DRAPEAU_DEGRES: i64 = 1;
const DRAPEAU_DELAI_LONG: i64 = 2;

/// Une ligne du stock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ligne {
    pub expression: Vec<u8>,
    pub degres: bool,
    pub delai_long: bool,
    /// millisecondes depuis l’époque Unix
    pub horodatage: i64,
}

impl Ligne {
    fn drapeaux(&self) -> i64 {
        let mut d = 0;
        if self.degres {
            d |= DRAPEAU_DEGRES;
        }
        if self.delai_long {
            d |= DRAPEAU_DELAI_LONG;
        }
        d
    }

    fn depuis_drapeaux(expression: Vec<u8>, drapeaux: i64, horodatage: i64) -> Ligne {
        Ligne {
            expression,
            degres: drapeaux & DRAPEAU_DEGRES != 0,
            delai_long: drapeaux & DRAPEAU_DELAI_LONG != 0,
            horodatage,
        }
    }
}

pub trait StockDurable: Send {
    /// Attribue un index (positif si `visible`, sinon ≤ -2) et enregistre la ligne.
    fn ajoute_ligne(&mut self, visible: bool, ligne: Ligne) -> Result<i64, ErreurStock>;

    fn lit_ligne(&mut self, index: i64) -> Result<Ligne, ErreurStock>;

    fn efface_tout(&mut self) -> Result<(), ErreurStock>;

    /// Plus petit index visible (0 si aucun).
    fn index_min(&mut self) -> Result<i64, ErreurStock>;

    /// Plus grand index visible (0 si aucun).
    fn index_max(&mut self) -> Result<i64, ErreurStock>;

    /// Bloque jusqu’à ce que toutes les écritures en file soient faites.
    fn attend_ecritures(&mut self) -> Result<(), ErreurStock>;

    fn ferme(&mut self) -> Result<(), ErreurStock>;
}

/* ------------------------ SQLite ------------------------ */

enum Commande {
    Ecrit(i64, Ligne),
    Lit(i64, Sender<Result<Option<Ligne>, ErreurStock>>),
    EffaceTout(Sender<Result<(), ErreurStock>>),
    Bornes(Sender<Result<(i64, i64), ErreurStock>>),
    /// Rend (et remet à zéro) la première écriture échouée.
    Attend(Sender<Option<String>>),
    Ferme,
}

pub struct StockSqlite {
    envoi: Option<Sender<Commande>>,
    ecrivain: Option<JoinHandle<()>>,
    prochain_visible: i64,
    prochain_cache: i64,
}

fn prepare(conn: &Connection) -> Result<(i64, i64), ErreurStock> {
    conn.execute_batch(
        r#"CREATE TABLE IF NOT EXISTS expressions (
               id          INTEGER PRIMARY KEY,
               expression  BLOB NOT NULL,
               drapeaux    INTEGER NOT NULL,
               horodatage  INTEGER NOT NULL
           );
           CREATE TABLE IF NOT EXISTS compteurs (
               id                INTEGER PRIMARY KEY CHECK (id = 0),
               prochain_visible  INTEGER NOT NULL,
               prochain_cache    INTEGER NOT NULL
           );"#,
    )?;
    let max: i64 = conn.query_row(
        "SELECT COALESCE(MAX(id), 0) FROM expressions WHERE id > 0",
        [],
        |row| row.get(0),
    )?;
    let min: i64 = conn.query_row(
        "SELECT COALESCE(MIN(id), 0) FROM expressions WHERE id < 0",
        [],
        |row| row.get(0),
    )?;
    let depuis_lignes = (max + 1, min.min(PREMIER_INDEX_CACHE + 1) - 1);
    // une base antérieure aux compteurs repart de ses lignes
    conn.execute(
        "INSERT OR IGNORE INTO compteurs (id, prochain_visible, prochain_cache) VALUES (0, ?1, ?2)",
        params![depuis_lignes.0, depuis_lignes.1],
    )?;
    let (visible, cache): (i64, i64) = conn.query_row(
        "SELECT prochain_visible, prochain_cache FROM compteurs WHERE id = 0",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((visible.max(depuis_lignes.0), cache.min(depuis_lignes.1)))
}

/// INSERT de la ligne, puis avancée du compteur persistant : un index n’est jamais
/// rendu, même après `efface_tout` et réouverture.
fn ecrit(conn: &Connection, index: i64, ligne: &Ligne) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO expressions (id, expression, drapeaux, horodatage) VALUES (?1, ?2, ?3, ?4)",
        params![index, ligne.expression, ligne.drapeaux(), ligne.horodatage],
    )?;
    let compteur = if index > 0 {
        "UPDATE compteurs SET prochain_visible = MAX(prochain_visible, ?1 + 1) WHERE id = 0"
    } else {
        "UPDATE compteurs SET prochain_cache = MIN(prochain_cache, ?1 - 1) WHERE id = 0"
    };
    conn.execute(compteur, params![index])?;
    Ok(())
}

fn lit(conn: &Connection, index: i64) -> Result<Option<Ligne>, ErreurStock> {
    let ligne = conn
        .query_row(
            "SELECT expression, drapeaux, horodatage FROM expressions WHERE id = ?1",
            params![index],
            |row| {
                Ok(Ligne::depuis_drapeaux(
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                ))
            },
        )
        .optional()?;
    Ok(ligne)
}

fn bornes(conn: &Connection) -> Result<(i64, i64), ErreurStock> {
    let b = conn.query_row(
        "SELECT COALESCE(MIN(id), 0), COALESCE(MAX(id), 0) FROM expressions WHERE id > 0",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(b)
}

/// Boucle du fil d’écriture : une commande à la fois, dans l’ordre d’arrivée.
fn boucle_ecrivain(conn: Connection, reception: Receiver<Commande>) {
    let mut premier_echec: Option<String> = None;

    for commande in reception {
        match commande {
            Commande::Ecrit(index, ligne) => {
                if let Err(e) = ecrit(&conn, index, &ligne) {
                    tracing::error!(index, erreur = %e, "écriture d’expression échouée");
                    premier_echec.get_or_insert_with(|| format!("index {index} : {e}"));
                }
            }
            Commande::Lit(index, reponse) => {
                let _ = reponse.send(lit(&conn, index));
            }
            Commande::EffaceTout(reponse) => {
                let r = conn
                    .execute("DELETE FROM expressions", [])
                    .map(|_| ())
                    .map_err(ErreurStock::from);
                let _ = reponse.send(r);
            }
            Commande::Bornes(reponse) => {
                let _ = reponse.send(bornes(&conn));
            }
            Commande::Attend(reponse) => {
                let _ = reponse.send(premier_echec.take());
            }
            Commande::Ferme => break,
        }
    }
    tracing::debug!("fil d’écriture arrêté");
}

impl StockSqlite {
    pub fn ouvre(chemin: &Path) -> Result<Self, ErreurStock> {
        tracing::info!(chemin = %chemin.display(), "ouverture du stock d’expressions");
        Self::demarre(Connection::open(chemin)?)
    }

    pub fn ouvre_en_memoire() -> Result<Self, ErreurStock> {
        Self::demarre(Connection::open_in_memory()?)
    }

    fn demarre(conn: Connection) -> Result<Self, ErreurStock> {
        let (prochain_visible, prochain_cache) = prepare(&conn)?;
        let (envoi, reception) = mpsc::channel();
        let ecrivain = thread::Builder::new()
            .name("stock-ecriture".into())
            .spawn(move || boucle_ecrivain(conn, reception))
            .map_err(|e| ErreurStock::EcritureEchouee(e.to_string()))?;
        Ok(Self {
            envoi: Some(envoi),
            ecrivain: Some(ecrivain),
            prochain_visible,
            prochain_cache,
        })
    }

    fn envoie(&self, commande: Commande) -> Result<(), ErreurStock> {
        self.envoi
            .as_ref()
            .ok_or(ErreurStock::EcrivainArrete)?
            .send(commande)
            .map_err(|_| ErreurStock::EcrivainArrete)
    }

    /// Envoie une commande avec canal de réponse, puis attend la réponse.
    fn demande<T>(
        &self,
        fabrique: impl FnOnce(Sender<T>) -> Commande,
    ) -> Result<T, ErreurStock> {
        let (reponse, attente) = mpsc::channel();
        self.envoie(fabrique(reponse))?;
        attente.recv().map_err(|_| ErreurStock::EcrivainArrete)
    }
}

impl StockDurable for StockSqlite {
    fn ajoute_ligne(&mut self, visible: bool, ligne: Ligne) -> Result<i64, ErreurStock> {
        let index = if visible {
            self.prochain_visible
        } else {
            self.prochain_cache
        };
        self.envoie(Commande::Ecrit(index, ligne))?;
        if visible {
            self.prochain_visible += 1;
        } else {
            self.prochain_cache -= 1;
        }
        tracing::debug!(index, "ligne mise en file");
        Ok(index)
    }

    fn lit_ligne(&mut self, index: i64) -> Result<Ligne, ErreurStock> {
        self.demande(|r| Commande::Lit(index, r))??
            .ok_or(ErreurStock::IndexInconnu(index))
    }

    fn efface_tout(&mut self) -> Result<(), ErreurStock> {
        self.demande(Commande::EffaceTout)?
    }

    fn index_min(&mut self) -> Result<i64, ErreurStock> {
        Ok(self.demande(Commande::Bornes)??.0)
    }

    fn index_max(&mut self) -> Result<i64, ErreurStock> {
        Ok(self.demande(Commande::Bornes)??.1)
    }

    fn attend_ecritures(&mut self) -> Result<(), ErreurStock> {
        match self.demande(Commande::Attend)? {
            None => Ok(()),
            Some(msg) => Err(ErreurStock::EcritureEchouee(msg)),
        }
    }

    fn ferme(&mut self) -> Result<(), ErreurStock> {
        if self.envoi.is_none() {
            return Ok(());
        }
        let bilan = self.attend_ecritures();
        let _ = self.envoie(Commande::Ferme);
        self.envoi = None;
        if let Some(fil) = self.ecrivain.take() {
            if fil.join().is_err() {
                tracing::error!("le fil d’écriture a paniqué");
            }
        }
        bilan
    }
}

impl Drop for StockSqlite {
    fn drop(&mut self) {
        if let Err(e) = self.ferme() {
            tracing::warn!(erreur = %e, "fermeture du stock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ligne(octets: &[u8], degres: bool) -> Ligne {
        Ligne {
            expression: octets.to_vec(),
            degres,
            delai_long: !degres,
            horodatage: 1_700_000_000_000,
        }
    }

    #[test]
    fn index_attribues_et_relus() {
        let mut s = StockSqlite::ouvre_en_memoire().unwrap();
        assert_eq!(s.ajoute_ligne(true, ligne(b"a", true)).unwrap(), 1);
        assert_eq!(s.ajoute_ligne(false, ligne(b"b", false)).unwrap(), -2);
        assert_eq!(s.ajoute_ligne(true, ligne(b"c", false)).unwrap(), 2);
        assert_eq!(s.ajoute_ligne(false, ligne(b"d", true)).unwrap(), -3);

        assert_eq!(s.lit_ligne(1).unwrap(), ligne(b"a", true));
        assert_eq!(s.lit_ligne(-3).unwrap(), ligne(b"d", true));
        assert!(matches!(s.lit_ligne(7), Err(ErreurStock::IndexInconnu(7))));
        assert_eq!(s.index_min().unwrap(), 1);
        assert_eq!(s.index_max().unwrap(), 2);
        s.attend_ecritures().unwrap();

        s.efface_tout().unwrap();
        assert_eq!(s.index_max().unwrap(), 0);
        // pas de réutilisation d’index dans le même processus
        assert_eq!(s.ajoute_ligne(true, ligne(b"e", true)).unwrap(), 3);
        s.ferme().unwrap();
        assert!(matches!(s.lit_ligne(3), Err(ErreurStock::EcrivainArrete)));
    }

    #[test]
    fn ecriture_en_double_signalee() {
        let mut s = StockSqlite::ouvre_en_memoire().unwrap();
        s.ajoute_ligne(true, ligne(b"a", true)).unwrap();
        // même index forcé : la contrainte de clé primaire échoue dans le fil d’écriture
        s.prochain_visible = 1;
        s.ajoute_ligne(true, ligne(b"b", true)).unwrap();
        assert!(matches!(
            s.attend_ecritures(),
            Err(ErreurStock::EcritureEchouee(_))
        ));
        // l’échec n’est rapporté qu’une fois
        s.attend_ecritures().unwrap();
    }

    #[test]
    fn reouverture_reprend_la_numerotation() {
        let dir = tempfile::tempdir().unwrap();
        let chemin = dir.path().join("expressions.db");
        {
            let mut s = StockSqlite::ouvre(&chemin).unwrap();
            s.ajoute_ligne(true, ligne(b"x", true)).unwrap();
            s.ajoute_ligne(true, ligne(b"y", false)).unwrap();
            s.ajoute_ligne(false, ligne(b"z", false)).unwrap();
            s.ferme().unwrap();
        }
        let mut s = StockSqlite::ouvre(&chemin).unwrap();
        assert_eq!(s.lit_ligne(2).unwrap(), ligne(b"y", false));
        assert_eq!(s.ajoute_ligne(true, ligne(b"w", true)).unwrap(), 3);
        assert_eq!(s.ajoute_ligne(false, ligne(b"v", true)).unwrap(), -3);
    }

    #[test]
    fn index_jamais_rendus_apres_effacement_et_reouverture() {
        let dir = tempfile::tempdir().unwrap();
        let chemin = dir.path().join("expressions.db");
        {
            let mut s = StockSqlite::ouvre(&chemin).unwrap();
            s.ajoute_ligne(true, ligne(b"x", true)).unwrap();
            s.ajoute_ligne(true, ligne(b"y", false)).unwrap();
            s.ajoute_ligne(false, ligne(b"z", false)).unwrap();
            s.efface_tout().unwrap();
            s.ferme().unwrap();
        }
        let mut s = StockSqlite::ouvre(&chemin).unwrap();
        assert_eq!(s.index_max().unwrap(), 0);
        assert_eq!(s.ajoute_ligne(true, ligne(b"w", true)).unwrap(), 3);
        assert_eq!(s.ajoute_ligne(false, ligne(b"v", true)).unwrap(), -3);
        s.ferme().unwrap();

        // et la numérotation survit à une seconde réouverture
        let mut s = StockSqlite::ouvre(&chemin).unwrap();
        assert_eq!(s.ajoute_ligne(true, ligne(b"u", false)).unwrap(), 4);
        assert_eq!(s.lit_ligne(3).unwrap(), ligne(b"w", true));
    }
}
