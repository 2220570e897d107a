// src/main.rs
//
// Calculatrice à réels constructifs : point d’entrée NATIF
// --------------------------------------------------------
// But:
// - Journal : tracing-subscriber, filtre RUST_LOG (défaut: calculatrice_reels=info)
// - Historique : SQLite au chemin CALCULATRICE_BD, sinon en mémoire
// - eframe::run_native + NativeOptions
//
// Le moteur repose sur des fils OS et SQLite : pas de cible wasm32.

use std::path::PathBuf;
use std::sync::Arc;

use eframe::egui;
use tracing_subscriber::EnvFilter;

use calculatrice_reels::config::ConfigMoteur;
use calculatrice_reels::erreur::ErreurStock;
use calculatrice_reels::moteur::{Evaluateur, SeparateursMilliers, StockSqlite};

mod app;

use app::AppCalc;

const TITRE_APP: &str = "Calculatrice à réels constructifs";

/// Variable d’environnement : chemin de la base d’historique.
const VAR_BD: &str = "CALCULATRICE_BD";

/// Budget de l’afficheur (chiffres monospace de la zone Résultat).
const LARGEUR_AFFICHAGE: SeparateursMilliers = SeparateursMilliers {
    caracteres: 28,
    largeur_separateur: 0.5,
    credit_ellipse: 1.0,
    credit_point: 0.0,
};

fn init_journal() {
    let filtre = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("calculatrice_reels=info"));
    tracing_subscriber::fmt().with_env_filter(filtre).init();
}

fn ouvre_stock() -> Result<StockSqlite, ErreurStock> {
    match std::env::var_os(VAR_BD) {
        Some(chemin) => StockSqlite::ouvre(&PathBuf::from(chemin)),
        None => {
            tracing::info!("{VAR_BD} absent : historique en mémoire");
            StockSqlite::ouvre_en_memoire()
        }
    }
}

fn main() -> eframe::Result<()> {
    init_journal();

    let stock = match ouvre_stock() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(erreur = %e, "stock d’historique indisponible");
            std::process::exit(1);
        }
    };
    let moteur = Evaluateur::new(
        ConfigMoteur::default(),
        Box::new(stock),
        Arc::new(LARGEUR_AFFICHAGE),
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(TITRE_APP)
            .with_inner_size([560.0, 780.0])
            .with_min_inner_size([420.0, 620.0]),
        ..Default::default()
    };

    eframe::run_native(
        TITRE_APP,
        options,
        Box::new(|_cc| Ok(Box::new(AppCalc::new(moteur)))),
    )
}
