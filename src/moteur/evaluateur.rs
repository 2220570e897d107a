//! src/moteur/evaluateur.rs
//!
//! Planificateur des évaluations : au plus une tâche de fond par fiche.
//!
//! Rôle :
//! - lancer les évaluations initiales (facultatives ou requises) et les raffinements
//! - appliquer délais, plafonds de bits et annulations
//! - publier les résultats sur le fil appelant, dans `pompe()`, puis prévenir l’écouteur
//!
//! Les fils de calcul ne voient qu’un instantané (expression partagée, cellule de valeur)
//! et rendent leur résultat par un canal ; toute écriture dans une fiche se fait ici.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::calcul::{
    calcul_initial, calcul_raffinement, Echec, ParamsInitial, ResolveurInstantane,
    ResultatInitial, Source,
};
use super::ecouteur::{Ecouteur, LargeurAffichage, TypeErreur};
use super::fiche::{Apercu, Fiche, Genre, Tache};
use super::precision::corrige_zeros;
use super::stock::StockDurable;
use super::table::{TableExpressions, INDEX_COURANT, INDEX_MIROIR};
use crate::config::ConfigMoteur;
use crate::erreur::{ErreurCalcul, ErreurStock};
use crate::expression::{Expression, Jeton};
use crate::reel::Annulation;

/// Attente maximale entre deux passages du chien de garde dans `pompe_bloquante`.
const TRANCHE_ATTENTE: Duration = Duration::from_millis(20);

enum Issue {
    Initiale(Result<ResultatInitial, Echec>),
    Raffinement {
        offset: i32,
        chiffres: Result<String, ErreurCalcul>,
    },
}

struct Message {
    index: i64,
    id: u64,
    issue: Issue,
}

pub struct Evaluateur {
    config: ConfigMoteur,
    table: TableExpressions,
    largeur: Arc<dyn LargeurAffichage>,
    envoi: Sender<Message>,
    reception: Receiver<Message>,
    prochain_id: u64,
    /// Fils annulés ou terminés, pas encore joints.
    orphelins: Vec<JoinHandle<()>>,
}

impl Evaluateur {
    pub fn new(
        config: ConfigMoteur,
        stock: Box<dyn StockDurable>,
        largeur: Arc<dyn LargeurAffichage>,
    ) -> Self {
        let (envoi, reception) = mpsc::channel();
        Self {
            config: config.bornee(),
            table: TableExpressions::new(stock),
            largeur,
            envoi,
            reception,
            prochain_id: 1,
            orphelins: Vec::new(),
        }
    }

    pub fn config(&self) -> &ConfigMoteur {
        &self.config
    }

    /// Fiche d’index quelconque (chargée depuis le stock au besoin).
    pub fn fiche(&mut self, index: i64) -> Result<&Fiche, ErreurStock> {
        self.table.get(index)
    }

    pub fn courante(&self) -> &Fiche {
        self.table.courante()
    }

    pub fn en_cours(&self, index: i64) -> bool {
        self.table
            .en_memoire(index)
            .is_some_and(|f| f.tache.is_some())
    }

    pub fn taches_actives(&self) -> usize {
        self.table.index_occupes().len()
    }

    /* ------------------------ Édition de la courante ------------------------ */

    fn edite_courante(&mut self, f: impl FnOnce(&mut Expression)) {
        self.annule_interne(INDEX_COURANT);
        self.table.courante_mut().edite(f);
    }

    pub fn ajoute(&mut self, jeton: Jeton) {
        self.edite_courante(|e| e.ajoute(jeton));
    }

    pub fn supprime_dernier(&mut self) -> Option<Jeton> {
        let mut retire = None;
        self.edite_courante(|e| retire = e.supprime_dernier());
        retire
    }

    pub fn efface_courant(&mut self) {
        self.edite_courante(Expression::efface);
        self.table.courante_mut().delai_long = false;
    }

    pub fn remplace_courant(&mut self, expression: Expression) {
        self.edite_courante(|e| *e = expression);
    }

    pub fn set_mode_degres(&mut self, degres: bool) {
        if self.table.courante().degres == degres {
            return;
        }
        self.annule_interne(INDEX_COURANT);
        let f = self.table.courante_mut();
        f.degres = degres;
        f.oublie_valeur();
    }

    /// Passe la courante au délai long (après une proposition acceptée).
    pub fn prolonge_delai(&mut self) {
        let f = self.table.courante_mut();
        if !f.delai_long {
            f.delai_long = true;
            f.modifiee = true;
        }
    }

    /* ------------------------ Requêtes ------------------------ */

    /// Évaluation initiale de la fiche `index`.
    ///
    /// Une requête facultative (pendant la saisie) n’interrompt jamais une tâche déjà lancée ;
    /// une requête requise ("=") remplace une tâche facultative encore en cours.
    pub fn requete_initiale(&mut self, index: i64, requise: bool, ecouteur: &mut dyn Ecouteur) {
        let fiche = match self.table.get_mut(index) {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(index, erreur = %e, "fiche introuvable");
                ecouteur.on_annule(index);
                return;
            }
        };

        if !fiche.modifiee {
            if let (Some(chiffres), Some(apercu)) = (&fiche.chiffres, &fiche.apercu) {
                tracing::debug!(index, "réponse depuis le cache");
                let partie = partie_entiere(chiffres).to_string();
                let apercu = apercu.clone();
                ecouteur.on_evalue(index, apercu.offset_affichage, apercu.msd, apercu.lsd, &partie);
                return;
            }
        }

        if let Some(genre) = fiche.tache.as_ref().map(|t| t.genre) {
            match genre {
                Genre::Initiale { requise: false } if requise => {
                    tracing::debug!(index, "tâche facultative remplacée par une requête");
                    self.annule_interne(index);
                }
                Genre::Initiale { .. } => return,
                Genre::Raffinement => {
                    self.annule_interne(index);
                }
            }
        }

        if index == INDEX_COURANT {
            self.table.courante_mut().oublie_chiffres();
        }
        self.lance_initiale(index, requise, ecouteur);
    }

    fn resolveur_pour(&mut self, index: i64) -> ResolveurInstantane {
        let mut resolveur = ResolveurInstantane::default();
        let mut a_voir = match self.table.get(index) {
            Ok(f) => f.expression.references(),
            Err(_) => Vec::new(),
        };
        while let Some(i) = a_voir.pop() {
            if resolveur.contient(i) {
                continue;
            }
            match self.table.get(i) {
                Ok(f) => {
                    a_voir.extend(f.expression.references());
                    resolveur.ajoute(
                        i,
                        Source {
                            expression: Arc::clone(&f.expression),
                            degres: f.degres,
                            valeur: Arc::clone(&f.valeur),
                        },
                    );
                }
                Err(e) => tracing::warn!(index = i, erreur = %e, "référence non résolue"),
            }
        }
        resolveur
    }

    fn lance_initiale(&mut self, index: i64, requise: bool, ecouteur: &mut dyn Ecouteur) {
        let resolveur = self.resolveur_pour(index);
        let id = self.nouvel_id();
        let fiche = match self.table.get_mut(index) {
            Ok(f) => f,
            Err(_) => return,
        };

        let (delai, bits_max) = if index == INDEX_COURANT || index == INDEX_MIROIR {
            self.config.budget(requise, fiche.delai_long)
        } else {
            (self.config.delai_historique, self.config.bits_max_long)
        };

        let params = ParamsInitial {
            expression: Arc::clone(&fiche.expression),
            degres: fiche.degres,
            valeur: Arc::clone(&fiche.valeur),
            resolveur,
            largeur: Arc::clone(&self.largeur),
            precision_initiale: self.config.precision_initiale,
            offset_msd_max: self.config.offset_msd_max,
            bits_max,
        };
        let annul = Annulation::new();
        let annul_fil = annul.clone();
        let envoi = self.envoi.clone();

        let fil = thread::Builder::new()
            .name(format!("calcul-{index}"))
            .spawn(move || {
                let issue = Issue::Initiale(calcul_initial(&params, &annul_fil));
                let _ = envoi.send(Message { index, id, issue });
            });

        match fil {
            Ok(fil) => {
                tracing::debug!(index, id, requise, ?delai, "évaluation lancée");
                installe(
                    fiche,
                    Tache {
                        id,
                        genre: Genre::Initiale { requise },
                        annul,
                        echeance: Some(Instant::now() + delai),
                        fil: Some(fil),
                    },
                );
            }
            Err(e) => {
                tracing::error!(index, erreur = %e, "impossible de lancer le fil de calcul");
                ecouteur.on_annule(index);
            }
        }
    }

    /// Demande des chiffres jusqu’à `offset` après la virgule.
    pub fn requete_raffinement(&mut self, index: i64, offset: i32, ecouteur: &mut dyn Ecouteur) {
        let id = self.nouvel_id();
        let (marge, diviseur) = (self.config.marge_raffinement, self.config.diviseur_marge);
        let Ok(fiche) = self.table.get_mut(index) else {
            return;
        };
        let (Some(chiffres), Some(valeur)) = (&fiche.chiffres, fiche.valeur.get()) else {
            return;
        };
        if fiche.offset_cache >= offset || fiche.offset_demande >= offset {
            return;
        }

        let demande = offset + marge + chiffres.len() as i32 / diviseur;
        let valeur = valeur.clone();
        if let Some(ancienne) = fiche.tache.take() {
            arrete(ancienne, &mut self.orphelins);
        }

        let annul = Annulation::new();
        let annul_fil = annul.clone();
        let envoi = self.envoi.clone();
        let fil = thread::Builder::new()
            .name(format!("raffinement-{index}"))
            .spawn(move || {
                let issue = Issue::Raffinement {
                    offset: demande,
                    chiffres: calcul_raffinement(&valeur, demande, &annul_fil),
                };
                let _ = envoi.send(Message { index, id, issue });
            });

        match fil {
            Ok(fil) => {
                tracing::debug!(index, id, offset = demande, "raffinement lancé");
                fiche.offset_demande = demande;
                installe(
                    fiche,
                    Tache {
                        id,
                        genre: Genre::Raffinement,
                        annul,
                        echeance: None,
                        fil: Some(fil),
                    },
                );
            }
            Err(e) => {
                tracing::error!(index, erreur = %e, "impossible de lancer le fil de raffinement");
                ecouteur.on_annule(index);
            }
        }
    }

    /// Chiffres en cache coupés à `offset` chiffres après la virgule
    /// (partie entière seule si `offset <= 0`). Lance un raffinement si le cache est trop court.
    pub fn chiffres(&mut self, index: i64, offset: i32, ecouteur: &mut dyn Ecouteur) -> Option<String> {
        let fiche = self.table.get(index).ok()?;
        let chiffres = fiche.chiffres.clone()?;
        let offset_cache = fiche.offset_cache;
        if offset > offset_cache {
            self.requete_raffinement(index, offset, ecouteur);
        }

        let point = chiffres.find('.').unwrap_or(chiffres.len());
        if offset <= 0 {
            return Some(chiffres[..point].to_string());
        }
        let fin = (point + 1 + offset.min(offset_cache) as usize).min(chiffres.len());
        Some(chiffres[..fin].to_string())
    }

    /* ------------------------ Pompe ------------------------ */

    /// Applique les délais, publie les résultats arrivés et prévient l’écouteur.
    /// À appeler régulièrement depuis le fil d’orchestration. Rend le nombre de messages traités.
    pub fn pompe(&mut self, ecouteur: &mut dyn Ecouteur) -> usize {
        self.surveille_delais(ecouteur);
        let mut traites = 0;
        while let Ok(message) = self.reception.try_recv() {
            self.traite(message, ecouteur);
            traites += 1;
        }
        self.orphelins.retain(|fil| !fil.is_finished());
        traites
    }

    /// Pompe jusqu’à ce qu’il n’y ait plus de tâche active ou que `max` soit écoulé.
    /// Rend `true` si toutes les tâches sont terminées.
    pub fn pompe_bloquante(&mut self, ecouteur: &mut dyn Ecouteur, max: Duration) -> bool {
        let limite = Instant::now() + max;
        loop {
            self.pompe(ecouteur);
            if self.table.index_occupes().is_empty() {
                return true;
            }
            let maintenant = Instant::now();
            if maintenant >= limite {
                return false;
            }
            match self
                .reception
                .recv_timeout(TRANCHE_ATTENTE.min(limite - maintenant))
            {
                Ok(message) => self.traite(message, ecouteur),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    fn surveille_delais(&mut self, ecouteur: &mut dyn Ecouteur) {
        let maintenant = Instant::now();
        for index in self.table.index_occupes() {
            let expiree = self
                .table
                .en_memoire(index)
                .and_then(|f| f.tache.as_ref())
                .and_then(|t| t.echeance)
                .is_some_and(|e| e <= maintenant);
            if !expiree {
                continue;
            }
            tracing::warn!(index, "délai dépassé");
            if let Some(Genre::Initiale { requise }) = self.annule_interne(index) {
                self.delai_depasse(index, requise, ecouteur);
            }
        }
    }

    /// Délai dépassé (ou partie entière trop grande) : proposition éventuelle, puis annulation.
    fn delai_depasse(&mut self, index: i64, requise: bool, ecouteur: &mut dyn Ecouteur) {
        if index != INDEX_COURANT {
            tracing::error!(index, "réévaluation d’une fiche d’historique abandonnée");
        } else if requise && !self.table.courante().delai_long {
            ecouteur.propose_delai_long(index);
        }
        ecouteur.on_annule(index);
    }

    fn traite(&mut self, message: Message, ecouteur: &mut dyn Ecouteur) {
        let Message { index, id, issue } = message;
        let Some(fiche) = self.table.en_memoire_mut(index) else {
            return;
        };
        let genre = match &fiche.tache {
            Some(t) if t.id == id => t.genre,
            _ => {
                tracing::debug!(index, id, "résultat périmé ignoré");
                return;
            }
        };
        if let Some(tache) = fiche.tache.take() {
            if let Some(fil) = tache.fil {
                self.orphelins.push(fil);
            }
        }

        match (issue, genre) {
            (Issue::Initiale(Ok(r)), _) => {
                tracing::debug!(index, offset = r.offset, "évaluation terminée");
                let partie = partie_entiere(&r.chiffres).to_string();
                fiche.chiffres = Some(r.chiffres);
                fiche.offset_cache = r.offset;
                fiche.offset_demande = r.offset;
                fiche.apercu = Some(Apercu {
                    offset_affichage: r.offset_affichage,
                    msd: r.msd,
                    lsd: r.lsd,
                });
                fiche.modifiee = false;
                ecouteur.on_evalue(index, r.offset_affichage, r.msd, r.lsd, &partie);
            }
            (Issue::Initiale(Err(Echec::TropGrand)), genre) => {
                fiche.modifiee = true;
                let requise = matches!(genre, Genre::Initiale { requise: true });
                self.delai_depasse(index, requise, ecouteur);
            }
            (Issue::Initiale(Err(Echec::Calcul(e))), genre) => {
                fiche.modifiee = true;
                let requise = matches!(genre, Genre::Initiale { requise: true });
                match TypeErreur::depuis(&e) {
                    None => {}
                    Some(t) if requise && index == INDEX_COURANT => ecouteur.on_erreur(index, t),
                    Some(_) => {
                        if index == INDEX_COURANT {
                            tracing::debug!(index, erreur = %e, "évaluation facultative en échec");
                        } else {
                            tracing::error!(index, erreur = %e, "réévaluation d’une fiche d’historique en échec");
                        }
                        ecouteur.on_annule(index);
                    }
                }
            }
            (Issue::Raffinement { offset, chiffres }, _) => match chiffres {
                Ok(nouveau) => {
                    let corrige = match &fiche.chiffres {
                        Some(ancien) => {
                            match corrige_zeros(ancien, fiche.offset_cache, &nouveau, offset) {
                                Ok(c) => c,
                                Err(e) => {
                                    tracing::error!(index, erreur = %e, "raffinement incohérent");
                                    panic!("raffinement incohérent sur la fiche {index}: {e}");
                                }
                            }
                        }
                        None => nouveau,
                    };
                    tracing::debug!(index, offset, "raffinement terminé");
                    fiche.chiffres = Some(corrige);
                    fiche.offset_cache = offset;
                    fiche.offset_demande = fiche.offset_demande.max(offset);
                    ecouteur.on_raffine(index);
                }
                Err(ErreurCalcul::Annule) => {
                    fiche.offset_demande = fiche.offset_cache;
                }
                Err(e) => {
                    tracing::error!(index, erreur = %e, "raffinement en échec");
                    fiche.offset_demande = fiche.offset_cache;
                }
            },
        }
    }

    /* ------------------------ Annulation ------------------------ */

    /// Arrête la tâche de la fiche sans rien notifier ; rend son genre s’il y en avait une.
    fn annule_interne(&mut self, index: i64) -> Option<Genre> {
        let fiche = self.table.en_memoire_mut(index)?;
        let tache = fiche.tache.take()?;
        let genre = tache.genre;
        match genre {
            Genre::Initiale { .. } => {
                // valeur pas encore publiée : la prochaine requête doit tout relancer
                if !fiche.valeur_publiee() || fiche.chiffres.is_none() {
                    fiche.modifiee = true;
                }
            }
            Genre::Raffinement => fiche.offset_demande = fiche.offset_cache,
        }
        tracing::debug!(index, id = tache.id, "tâche annulée");
        arrete(tache, &mut self.orphelins);
        Some(genre)
    }

    /// Annule la tâche de `index`. Une annulation bruyante prévient l’écouteur.
    pub fn annule(&mut self, index: i64, silencieux: bool, ecouteur: &mut dyn Ecouteur) -> bool {
        if self.annule_interne(index).is_none() {
            return false;
        }
        if !silencieux {
            tracing::warn!(index, "évaluation annulée");
            ecouteur.signale_annulation(index);
            ecouteur.on_annule(index);
        }
        true
    }

    pub fn annule_tout(&mut self, silencieux: bool, ecouteur: &mut dyn Ecouteur) -> bool {
        let mut une = false;
        for index in self.table.index_occupes() {
            une |= self.annule(index, silencieux, ecouteur);
        }
        une
    }

    /// Annule toutes les tâches sauf celle de la courante, sans notification.
    pub fn annule_tout_sauf_courant(&mut self) {
        for index in self.table.index_occupes() {
            if index != INDEX_COURANT {
                self.annule_interne(index);
            }
        }
    }

    /* ------------------------ Table ------------------------ */

    /// Fige la courante : nouvel index (positif si `visible`), valeur partagée.
    pub fn fige_courant(&mut self, visible: bool) -> Result<i64, ErreurStock> {
        self.table.ajoute_immuable(INDEX_COURANT, visible)
    }

    pub fn synchronise_miroir(&mut self) {
        self.annule_interne(INDEX_MIROIR);
        self.table.synchronise_miroir();
    }

    /// Vide l’historique (courante et miroir conservés).
    pub fn efface_historique(&mut self) -> Result<(), ErreurStock> {
        self.annule_tout_sauf_courant();
        self.table.efface_tout()
    }

    pub fn index_min(&mut self) -> Result<i64, ErreurStock> {
        self.table.index_min()
    }

    pub fn index_max(&mut self) -> Result<i64, ErreurStock> {
        self.table.index_max()
    }

    pub fn attend_ecritures(&mut self) -> Result<(), ErreurStock> {
        self.table.attend_ecritures()
    }

    /// Arrête toutes les tâches, attend les fils et vide le stock.
    pub fn ferme(&mut self) -> Result<(), ErreurStock> {
        self.annule_tout_sauf_courant();
        self.annule_interne(INDEX_COURANT);
        for fil in self.orphelins.drain(..) {
            if fil.join().is_err() {
                tracing::error!("un fil de calcul a paniqué");
            }
        }
        self.table.ferme()
    }

    fn nouvel_id(&mut self) -> u64 {
        let id = self.prochain_id;
        self.prochain_id += 1;
        id
    }
}

fn installe(fiche: &mut Fiche, tache: Tache) {
    if let Some(t) = &fiche.tache {
        panic!("deux tâches sur une même fiche (ids {} et {})", t.id, tache.id);
    }
    fiche.tache = Some(tache);
}

fn arrete(tache: Tache, orphelins: &mut Vec<JoinHandle<()>>) {
    tache.annul.annule();
    if let Some(fil) = tache.fil {
        orphelins.push(fil);
    }
}

fn partie_entiere(chiffres: &str) -> &str {
    chiffres.split('.').next().unwrap_or(chiffres)
}
