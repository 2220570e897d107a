// src/app.rs
//
// Calculatrice : module App (racine)
// ---------------------------------
// Rôle:
// - Déclarer les sous-modules (etat.rs + vue.rs)
// - Ré-exporter AppCalc (pour main.rs: use crate::app::AppCalc;)
// - Fournir l’impl eframe::App : pompe du moteur à chaque image, puis la vue
//
// Important:
// - Les notifications du moteur n’arrivent que pendant `pompe()`, donc sur ce fil.
// - Tant qu’une tâche de fond tourne, on redemande une image après un court délai.

pub mod etat;
pub mod vue;

pub use etat::AppCalc;

use std::time::Duration;

use eframe::egui;

/// Intervalle de relance de l’UI pendant un calcul.
const INTERVALLE_POMPE: Duration = Duration::from_millis(50);

impl eframe::App for AppCalc {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ESC = effacer l’entrée (comme bouton "C").
        let esc = ctx.input(|i| i.key_pressed(egui::Key::Escape));
        if esc {
            self.clear_entree();
        }

        self.pompe();

        egui::CentralPanel::default().show(ctx, |ui| {
            self.ui(ui);
        });

        if self.calcul_en_cours() {
            ctx.request_repaint_after(INTERVALLE_POMPE);
        }
    }
}
