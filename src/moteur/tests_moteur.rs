// src/moteur/tests_moteur.rs
//
// Campagne du planificateur : requêtes, cache, raffinements, délais, annulations,
// historique figé et stock.

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::config::ConfigMoteur;
use crate::erreur::ErreurStock;
use crate::expression::{Expression, Jeton};

const ATTENTE: Duration = Duration::from_secs(20);

#[derive(Clone, Debug, PartialEq)]
enum Evt {
    Evalue {
        index: i64,
        offset: i32,
        msd: Option<usize>,
        lsd: ChiffreFaible,
        partie: String,
    },
    Erreur(i64, TypeErreur),
    Annule(i64),
    Raffine(i64),
    Propose(i64),
    Signale(i64),
}

#[derive(Default)]
struct Journal(Vec<Evt>);

impl Journal {
    fn vide(&mut self) -> Vec<Evt> {
        std::mem::take(&mut self.0)
    }
}

impl Ecouteur for Journal {
    fn on_evalue(
        &mut self,
        index: i64,
        offset: i32,
        msd: Option<usize>,
        lsd: ChiffreFaible,
        partie_entiere: &str,
    ) {
        self.0.push(Evt::Evalue {
            index,
            offset,
            msd,
            lsd,
            partie: partie_entiere.to_string(),
        });
    }

    fn on_erreur(&mut self, index: i64, erreur: TypeErreur) {
        self.0.push(Evt::Erreur(index, erreur));
    }

    fn on_annule(&mut self, index: i64) {
        self.0.push(Evt::Annule(index));
    }

    fn on_raffine(&mut self, index: i64) {
        self.0.push(Evt::Raffine(index));
    }

    fn propose_delai_long(&mut self, index: i64) {
        self.0.push(Evt::Propose(index));
    }

    fn signale_annulation(&mut self, index: i64) {
        self.0.push(Evt::Signale(index));
    }
}

fn moteur_avec(config: ConfigMoteur) -> Evaluateur {
    Evaluateur::new(
        config,
        Box::new(StockSqlite::ouvre_en_memoire().unwrap()),
        Arc::new(LargeurFixe(16)),
    )
}

fn moteur() -> Evaluateur {
    moteur_avec(ConfigMoteur::default())
}

fn saisit(m: &mut Evaluateur, texte: &str) {
    m.remplace_courant(Expression::depuis_texte(texte).unwrap());
}

fn evalue(m: &mut Evaluateur, j: &mut Journal, index: i64, requise: bool) -> Vec<Evt> {
    m.requete_initiale(index, requise, j);
    assert!(m.pompe_bloquante(j, ATTENTE));
    j.vide()
}

fn partie(evts: &[Evt]) -> &str {
    match evts {
        [Evt::Evalue { partie, .. }] => partie,
        autre => panic!("évaluation attendue, reçu {autre:?}"),
    }
}

#[test]
fn division_par_zero() {
    let mut m = moteur();
    let mut j = Journal::default();
    saisit(&mut m, "1÷0");
    assert_eq!(evalue(&mut m, &mut j, 0, true), vec![Evt::Erreur(0, TypeErreur::Domaine)]);

    // pendant la saisie, une erreur se traduit par un simple retour en arrière
    saisit(&mut m, "1÷0");
    assert_eq!(evalue(&mut m, &mut j, 0, false), vec![Evt::Annule(0)]);

    saisit(&mut m, "2×(3");
    assert_eq!(evalue(&mut m, &mut j, 0, true), vec![Evt::Erreur(0, TypeErreur::Syntaxe)]);
}

#[test]
fn resultat_puis_reponse_depuis_le_cache() {
    let mut m = moteur();
    let mut j = Journal::default();
    saisit(&mut m, "1÷3");
    let premier = evalue(&mut m, &mut j, 0, true);
    assert_eq!(
        premier,
        vec![Evt::Evalue {
            index: 0,
            offset: 14,
            msd: Some(2),
            lsd: ChiffreFaible::Inconnu,
            partie: "0".into(),
        }]
    );

    // rien n’a changé : réponse immédiate, sans tâche
    m.requete_initiale(0, true, &mut j);
    assert!(!m.en_cours(0));
    assert_eq!(j.vide(), premier);
}

#[test]
fn raffinement_a_la_demande() {
    let mut m = moteur();
    let mut j = Journal::default();
    saisit(&mut m, "1÷3");
    evalue(&mut m, &mut j, 0, true);

    assert_eq!(m.chiffres(0, 10, &mut j).as_deref(), Some("0.3333333333"));
    assert!(!m.en_cours(0));

    let court = m.chiffres(0, 300, &mut j).unwrap();
    assert!(court.len() < 302);
    assert!(m.en_cours(0));
    assert!(m.pompe_bloquante(&mut j, ATTENTE));
    assert_eq!(j.vide(), vec![Evt::Raffine(0)]);

    let long = m.chiffres(0, 300, &mut j).unwrap();
    assert_eq!(long.len(), 302);
    assert!(long[2..].bytes().all(|b| b == b'3'));
    assert!(!m.en_cours(0));
}

#[test]
fn mode_degres() {
    let mut m = moteur();
    let mut j = Journal::default();
    m.set_mode_degres(true);
    saisit(&mut m, "sin(30)");
    let evts = evalue(&mut m, &mut j, 0, true);
    assert!(matches!(
        evts.as_slice(),
        [Evt::Evalue { offset: 1, lsd: ChiffreFaible::Position(1), .. }]
    ));
    assert_eq!(m.chiffres(0, 1, &mut j).as_deref(), Some("0.5"));

    // changer de mode oublie la valeur
    m.set_mode_degres(false);
    assert!(m.courante().modifiee);
    assert!(!m.courante().valeur_publiee());
}

#[test]
fn partie_entiere_trop_grande_puis_delai_long() {
    let mut m = moteur();
    let mut j = Journal::default();
    saisit(&mut m, "10^60000");
    assert_eq!(
        evalue(&mut m, &mut j, 0, true),
        vec![Evt::Propose(0), Evt::Annule(0)]
    );

    m.prolonge_delai();
    let evts = evalue(&mut m, &mut j, 0, true);
    assert_eq!(partie(&evts).len(), 60_001);
    assert!(partie(&evts).starts_with("10000"));
}

#[test]
fn puissance_paresseuse_trop_grande_meme_en_delai_long() {
    let mut m = moteur();
    let mut j = Journal::default();
    saisit(&mut m, "10^300000");
    assert_eq!(
        evalue(&mut m, &mut j, 0, true),
        vec![Evt::Propose(0), Evt::Annule(0)]
    );

    // ~996579 bits : au-delà du plafond long aussi
    m.prolonge_delai();
    assert_eq!(evalue(&mut m, &mut j, 0, true), vec![Evt::Annule(0)]);
    m.ferme().unwrap();
}

#[test]
fn chien_de_garde() {
    let config = ConfigMoteur {
        delai_court: Duration::from_millis(10),
        ..ConfigMoteur::default()
    };
    let mut m = moteur_avec(config);
    let mut j = Journal::default();
    saisit(&mut m, "e^(10^5)");
    assert_eq!(
        evalue(&mut m, &mut j, 0, true),
        vec![Evt::Propose(0), Evt::Annule(0)]
    );
    assert!(m.courante().modifiee);

    // une fois le délai long accepté, plus de proposition
    m.prolonge_delai();
    m.requete_initiale(0, true, &mut j);
    assert!(m.annule(0, false, &mut j));
    assert_eq!(j.vide(), vec![Evt::Signale(0), Evt::Annule(0)]);
    m.ferme().unwrap();
}

#[test]
fn annulation_puis_nouvelle_requete() {
    let mut m = moteur();
    let mut j = Journal::default();
    saisit(&mut m, "sin(1)");
    m.requete_initiale(0, true, &mut j);
    assert!(m.annule(0, false, &mut j));
    assert!(!m.annule(0, false, &mut j));
    assert_eq!(j.vide(), vec![Evt::Signale(0), Evt::Annule(0)]);

    // le résultat de la tâche annulée n’est jamais publié dans la fiche
    let evts = evalue(&mut m, &mut j, 0, true);
    assert_eq!(partie(&evts), "0");
    assert!(m
        .chiffres(0, 14, &mut j)
        .unwrap()
        .starts_with("0.84147098480789"));
}

#[test]
fn edition_annule_en_silence() {
    let mut m = moteur();
    let mut j = Journal::default();
    saisit(&mut m, "12");
    m.requete_initiale(0, false, &mut j);
    m.ajoute(Jeton::Chiffre(3));
    assert!(!m.en_cours(0));
    assert!(m.pompe_bloquante(&mut j, ATTENTE));
    assert!(j.vide().is_empty());

    let evts = evalue(&mut m, &mut j, 0, false);
    assert_eq!(partie(&evts), "123");
    assert_eq!(m.supprime_dernier(), Some(Jeton::Chiffre(3)));
    assert!(m.courante().modifiee);
    assert_eq!(m.courante().expression.texte(), "12");
}

#[test]
fn requete_facultative_ne_double_pas_une_tache() {
    let mut m = moteur();
    let mut j = Journal::default();
    saisit(&mut m, "√(2)");
    m.requete_initiale(0, false, &mut j);
    m.requete_initiale(0, false, &mut j);
    // la requise remplace la facultative
    m.requete_initiale(0, true, &mut j);
    assert!(m.pompe_bloquante(&mut j, ATTENTE));
    let evts = j.vide();
    assert_eq!(partie(&evts), "1");
}

#[test]
fn figer_et_referencer() {
    let mut m = moteur();
    let mut j = Journal::default();
    saisit(&mut m, "2+3");
    evalue(&mut m, &mut j, 0, true);
    let i = m.fige_courant(true).unwrap();
    assert_eq!(i, 1);
    assert_eq!(m.index_max().unwrap(), 1);

    saisit(&mut m, "#1×2");
    let evts = evalue(&mut m, &mut j, 0, true);
    assert_eq!(partie(&evts), "10");

    // la copie figée a gardé ses chiffres : réponse depuis le cache
    m.requete_initiale(1, false, &mut j);
    assert!(!m.en_cours(1));
    assert_eq!(partie(&j.vide()), "5");

    saisit(&mut m, "#7");
    assert_eq!(evalue(&mut m, &mut j, 0, true), vec![Evt::Erreur(0, TypeErreur::Syntaxe)]);
}

#[test]
fn historique_en_echec_seulement_journalise() {
    let mut m = moteur();
    let mut j = Journal::default();
    saisit(&mut m, "ln(0)");
    let i = m.fige_courant(true).unwrap();
    assert_eq!(evalue(&mut m, &mut j, i, true), vec![Evt::Annule(i)]);
}

#[test]
fn miroir_et_effacement() {
    let mut m = moteur();
    let mut j = Journal::default();
    saisit(&mut m, "7");
    m.synchronise_miroir();
    saisit(&mut m, "8");
    let evts = evalue(&mut m, &mut j, INDEX_MIROIR, true);
    assert_eq!(partie(&evts), "7");

    m.fige_courant(true).unwrap();
    m.fige_courant(false).unwrap();
    m.efface_historique().unwrap();
    assert_eq!(m.index_max().unwrap(), 0);
    assert!(matches!(m.fiche(1), Err(ErreurStock::IndexInconnu(1))));
    assert_eq!(m.fiche(INDEX_MIROIR).unwrap().expression.texte(), "7");

    // les index ne sont pas réattribués
    assert_eq!(m.fige_courant(true).unwrap(), 2);
}

#[test]
fn reevaluation_apres_redemarrage() {
    let dir = tempfile::tempdir().unwrap();
    let chemin = dir.path().join("historique.db");
    {
        let mut m = Evaluateur::new(
            ConfigMoteur::default(),
            Box::new(StockSqlite::ouvre(&chemin).unwrap()),
            Arc::new(LargeurFixe(16)),
        );
        saisit(&mut m, "√(2)");
        m.fige_courant(true).unwrap();
        m.ferme().unwrap();
    }

    let mut m = Evaluateur::new(
        ConfigMoteur::default(),
        Box::new(StockSqlite::ouvre(&chemin).unwrap()),
        Arc::new(LargeurFixe(16)),
    );
    let mut j = Journal::default();
    assert_eq!(m.index_min().unwrap(), 1);
    let evts = evalue(&mut m, &mut j, 1, false);
    assert!(matches!(
        evts.as_slice(),
        [Evt::Evalue { index: 1, msd: Some(0), lsd: ChiffreFaible::Inconnu, .. }]
    ));
    assert_eq!(m.chiffres(1, 5, &mut j).as_deref(), Some("1.41421"));
    m.ferme().unwrap();
}
