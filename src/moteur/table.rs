//! src/moteur/table.rs
//!
//! Table des fiches, indexée par entier signé :
//! - 0 : expression courante (seule modifiable, jamais écrite dans le stock)
//! - -1 : miroir de la courante (copie au moment de la synchronisation)
//! - 1, 2, … : historique ; -2, -3, … : fiches figées hors historique
//!
//! Les fiches du stock sont chargées au premier accès et restent en mémoire.

use std::collections::HashMap;

use super::fiche::Fiche;
use super::stock::StockDurable;
use crate::erreur::ErreurStock;
use crate::expression::Expression;

pub const INDEX_COURANT: i64 = 0;
pub const INDEX_MIROIR: i64 = -1;

pub struct TableExpressions {
    fiches: HashMap<i64, Fiche>,
    stock: Box<dyn StockDurable>,
}

impl TableExpressions {
    pub fn new(stock: Box<dyn StockDurable>) -> Self {
        let mut fiches = HashMap::new();
        fiches.insert(INDEX_COURANT, Fiche::nouvelle(Expression::new(), false));
        Self { fiches, stock }
    }

    /// Charge la fiche depuis le stock si elle n’est pas encore en mémoire.
    fn charge(&mut self, index: i64) -> Result<(), ErreurStock> {
        if self.fiches.contains_key(&index) {
            return Ok(());
        }
        if index == INDEX_COURANT {
            panic!("la fiche courante a disparu de la table");
        }
        if index == INDEX_MIROIR {
            return Err(ErreurStock::IndexInconnu(index));
        }
        let ligne = self.stock.lit_ligne(index)?;
        tracing::debug!(index, "fiche réhydratée depuis le stock");
        self.fiches.insert(index, Fiche::depuis_ligne(&ligne)?);
        Ok(())
    }

    pub fn get(&mut self, index: i64) -> Result<&Fiche, ErreurStock> {
        self.charge(index)?;
        self.fiches.get(&index).ok_or(ErreurStock::IndexInconnu(index))
    }

    pub fn get_mut(&mut self, index: i64) -> Result<&mut Fiche, ErreurStock> {
        self.charge(index)?;
        self.fiches
            .get_mut(&index)
            .ok_or(ErreurStock::IndexInconnu(index))
    }

    /// Fiche déjà en mémoire (sans accès au stock).
    pub fn en_memoire(&self, index: i64) -> Option<&Fiche> {
        self.fiches.get(&index)
    }

    pub fn en_memoire_mut(&mut self, index: i64) -> Option<&mut Fiche> {
        self.fiches.get_mut(&index)
    }

    pub fn courante(&self) -> &Fiche {
        match self.fiches.get(&INDEX_COURANT) {
            Some(f) => f,
            None => panic!("la fiche courante a disparu de la table"),
        }
    }

    pub fn courante_mut(&mut self) -> &mut Fiche {
        match self.fiches.get_mut(&INDEX_COURANT) {
            Some(f) => f,
            None => panic!("la fiche courante a disparu de la table"),
        }
    }

    /// Index des fiches en mémoire ayant une tâche active.
    pub fn index_occupes(&self) -> Vec<i64> {
        self.fiches
            .iter()
            .filter(|(_, f)| f.tache.is_some())
            .map(|(i, _)| *i)
            .collect()
    }

    /// Fige une copie de la fiche `source` : nouvel index (positif si `visible`), écrit dans le stock.
    pub fn ajoute_immuable(&mut self, source: i64, visible: bool) -> Result<i64, ErreurStock> {
        let copie = self.get(source)?.instantane();
        let index = self.stock.ajoute_ligne(visible, copie.vers_ligne()?)?;
        tracing::info!(index, visible, "expression figée");
        self.fiches.insert(index, copie);
        Ok(index)
    }

    /// Recopie la fiche courante dans le miroir (-1).
    pub fn synchronise_miroir(&mut self) {
        let copie = self.courante().instantane();
        self.fiches.insert(INDEX_MIROIR, copie);
    }

    /// Efface l’historique : stock vidé, seules la courante et le miroir restent.
    pub fn efface_tout(&mut self) -> Result<(), ErreurStock> {
        self.stock.efface_tout()?;
        self.fiches
            .retain(|&i, _| i == INDEX_COURANT || i == INDEX_MIROIR);
        Ok(())
    }

    pub fn index_min(&mut self) -> Result<i64, ErreurStock> {
        self.stock.index_min()
    }

    pub fn index_max(&mut self) -> Result<i64, ErreurStock> {
        self.stock.index_max()
    }

    pub fn attend_ecritures(&mut self) -> Result<(), ErreurStock> {
        self.stock.attend_ecritures()
    }

    pub fn ferme(&mut self) -> Result<(), ErreurStock> {
        self.stock.ferme()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moteur::fiche::publie;
    use crate::moteur::stock::StockSqlite;
    use crate::reel::Reel;

    fn table() -> TableExpressions {
        TableExpressions::new(Box::new(StockSqlite::ouvre_en_memoire().unwrap()))
    }

    #[test]
    fn figer_partage_la_valeur_et_persiste() {
        let mut t = table();
        t.courante_mut()
            .edite(|e| *e = Expression::depuis_texte("2+3").unwrap());
        publie(&t.courante().valeur, Reel::entier(5));

        let i = t.ajoute_immuable(INDEX_COURANT, true).unwrap();
        assert_eq!(i, 1);
        let figee = t.get(i).unwrap();
        assert_eq!(figee.expression.texte(), "2+3");
        assert!(figee.valeur_publiee());

        let j = t.ajoute_immuable(INDEX_COURANT, false).unwrap();
        assert_eq!(j, -2);
        assert_eq!(t.index_max().unwrap(), 1);
    }

    #[test]
    fn rehydratation_apres_redemarrage() {
        let dir = tempfile::tempdir().unwrap();
        let chemin = dir.path().join("h.db");
        {
            let mut t = TableExpressions::new(Box::new(StockSqlite::ouvre(&chemin).unwrap()));
            t.courante_mut().degres = true;
            t.courante_mut()
                .edite(|e| *e = Expression::depuis_texte("sin(30)").unwrap());
            t.ajoute_immuable(INDEX_COURANT, true).unwrap();
            t.ferme().unwrap();
        }
        let mut t = TableExpressions::new(Box::new(StockSqlite::ouvre(&chemin).unwrap()));
        let f = t.get(1).unwrap();
        assert_eq!(f.expression.texte(), "sin(30)");
        assert!(f.degres);
        assert!(!f.valeur_publiee());
        assert!(matches!(t.get(9), Err(ErreurStock::IndexInconnu(9))));
    }

    #[test]
    fn miroir_independant_de_la_courante() {
        let mut t = table();
        t.courante_mut()
            .edite(|e| *e = Expression::depuis_texte("1").unwrap());
        t.synchronise_miroir();
        t.courante_mut()
            .edite(|e| *e = Expression::depuis_texte("2").unwrap());
        assert_eq!(t.get(INDEX_MIROIR).unwrap().expression.texte(), "1");
        assert_eq!(t.courante().expression.texte(), "2");

        t.ajoute_immuable(INDEX_COURANT, true).unwrap();
        t.efface_tout().unwrap();
        assert!(t.get(INDEX_MIROIR).is_ok());
        assert_eq!(t.index_max().unwrap(), 0);
    }
}
