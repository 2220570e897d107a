// src/app/vue.rs
//
// Vue (UI egui)
// -------------
// Objectifs :
// - Clavier : Enter = "=", la saisie est évaluée au fil de l’eau (requêtes facultatives)
// - Tactile : gros boutons, focus redonné après clic (focus_entree)
// - Résultat : chiffres tronqués, prolongés à la demande (ΣLocal), notation scientifique
//   quand la partie entière déborde ou que le nombre est très petit
// - Historique : entrées figées, réutilisables par référence (#n)

use eframe::egui;

use super::etat::{AppCalc, Resultat};
use calculatrice_reels::expression::{Constante, Expression, Fonction, Jeton};
use calculatrice_reels::moteur::INDEX_COURANT;

/// Au-delà, une partie entière passe en notation scientifique.
const LONGUEUR_SCIENTIFIQUE: usize = 24;
/// Chiffres de mantisse en notation scientifique.
const CHIFFRES_MANTISSE: usize = 16;
/// Zéros après la virgule tolérés avant de passer en notation scientifique.
const ZEROS_TOLERES: usize = 4;

const SEPARATEUR: char = '\u{2009}';

impl AppCalc {
    /// UI principale : à appeler depuis eframe::App::update(...)
    pub fn ui(&mut self, ui: &mut egui::Ui) {
        ui.spacing_mut().item_spacing = egui::vec2(6.0, 6.0);

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.heading("Calculatrice à réels constructifs");
                ui.add_space(6.0);

                self.ui_entree(ui);

                ui.add_space(8.0);
                ui.separator();
                ui.add_space(8.0);

                self.ui_resultat(ui);

                ui.add_space(8.0);
                ui.separator();
                ui.add_space(8.0);

                self.ui_historique(ui);
            });
    }

    fn ui_entree(&mut self, ui: &mut egui::Ui) {
        ui.label("Expression :");

        let champ = ui.add(
            egui::TextEdit::singleline(&mut self.entree)
                .desired_width(ui.available_width())
                .hint_text("Ex: sin(π÷6)+√(2), e^π, #1×2")
                .id_source("saisie_expression")
                .code_editor(),
        );
        if self.focus_entree {
            champ.request_focus();
            self.focus_entree = false;
        }
        if champ.changed() {
            self.saisie_modifiee();
        }
        if champ.has_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            self.egal();
            self.focus_entree = true;
        }

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            for (touche, aide, action) in ACTIONS {
                let clic = ui
                    .add_sized([56.0, 30.0], egui::Button::new(touche))
                    .on_hover_text(aide)
                    .clicked();
                if clic {
                    self.execute(action);
                }
            }

            ui.separator();
            let mut degres = self.degres;
            if ui.checkbox(&mut degres, "Degrés").changed() {
                self.set_degres(degres);
            }

            ui.separator();
            ui.label("ΣLocal :");
            let mut n = self.digits as u32;
            let glisse = ui.add(
                egui::DragValue::new(&mut n)
                    .speed(1)
                    .range(0..=2000)
                    .suffix(" chiffres"),
            );
            if glisse.changed() {
                self.set_digits(n as usize);
            }
        });

        ui.add_space(6.0);
        ui.horizontal_wrapped(|ui| {
            for jeton in operateurs().into_iter().chain(fonctions()) {
                self.touche(ui, jeton, [46.0, 28.0]);
            }
            ui.add_space(10.0);
            if ui.add_sized([64.0, 32.0], egui::Button::new("=")).clicked() {
                self.egal();
                self.focus_entree = true;
            }
        });

        ui.add_space(6.0);
        egui::Grid::new("pave_chiffres")
            .num_columns(3)
            .spacing([6.0, 6.0])
            .show(ui, |ui| {
                for rangee in PAVE {
                    for c in rangee.chars() {
                        let jeton = match c.to_digit(10) {
                            Some(d) => Jeton::Chiffre(d as u8),
                            None => Jeton::Point,
                        };
                        self.touche(ui, jeton, [56.0, 34.0]);
                    }
                    ui.end_row();
                }
            });

        if !self.affichage.erreur.is_empty() {
            ui.add_space(4.0);
            ui.colored_label(ui.visuals().error_fg_color, &self.affichage.erreur);
        }
    }

    /// Bouton qui ajoute un jeton à la saisie.
    fn touche(&mut self, ui: &mut egui::Ui, jeton: Jeton, taille: [f32; 2]) {
        let libelle = match &jeton {
            Jeton::Fonction(f) => f.nom().to_string(),
            autre => autre.texte(),
        };
        if ui.add_sized(taille, egui::Button::new(libelle)).clicked() {
            let texte = jeton.texte();
            // un opérateur est entouré d’espaces, le reste est collé
            if jeton.est_operateur() {
                let garde = self.entree.trim_end().len();
                self.entree.truncate(garde);
                self.entree.push(' ');
                self.entree.push_str(&texte);
                self.entree.push(' ');
            } else {
                self.entree.push_str(&texte);
            }
            self.saisie_modifiee();
            self.focus_entree = true;
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::Efface => self.clear_entree(),
            Action::Reinitialise => self.reset_total(),
            Action::Retour => self.retire_dernier_jeton(),
        }
        self.focus_entree = true;
    }

    /// Retire le dernier jeton ("sin(", "#12", "π"…) plutôt que le dernier caractère.
    fn retire_dernier_jeton(&mut self) {
        match Expression::depuis_texte(&self.entree) {
            Ok(mut e) => {
                e.supprime_dernier();
                self.entree = e.texte();
            }
            Err(_) => {
                self.entree.pop();
            }
        }
        self.saisie_modifiee();
    }

    fn ui_resultat(&mut self, ui: &mut egui::Ui) {
        ui.label("Résultat :");
        let texte = match self.chiffres(INDEX_COURANT) {
            Some((chiffres, r)) => formate(&chiffres, &r),
            None => String::new(),
        };
        Self::cadre_resultat(ui, &texte, 2);

        ui.horizontal(|ui| {
            if self.moteur.en_cours(INDEX_COURANT) {
                ui.spinner();
                ui.label("calcul en cours…");
                if ui.button("Annuler").clicked() {
                    self.annule_calcul();
                }
            }
            if !self.affichage.message.is_empty() {
                ui.label(&self.affichage.message);
            }
        });

        if self.affichage.proposition_delai {
            ui.horizontal(|ui| {
                ui.label("Délai dépassé.");
                if ui.button("Utiliser un délai plus long").clicked() {
                    self.delai_plus_long();
                }
            });
        }
    }

    fn ui_historique(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Historique")
            .default_open(true)
            .show(ui, |ui| {
                if self.historique.is_empty() {
                    ui.monospace("vide");
                    return;
                }

                // plus récent en haut
                let index: Vec<i64> = self.historique.iter().rev().copied().collect();
                for i in index {
                    self.demande_historique(i);
                    let expression = self.texte_historique(i);
                    let valeur = match self.chiffres(i) {
                        Some((chiffres, r)) => formate(&chiffres, &r),
                        None if self.moteur.en_cours(i) => "…".into(),
                        None => "?".into(),
                    };
                    ui.horizontal(|ui| {
                        if ui
                            .small_button(format!("#{i}"))
                            .on_hover_text("Réutiliser ce résultat")
                            .clicked()
                        {
                            self.reutilise(i);
                        }
                        ui.monospace(format!("{expression} = {valeur}"));
                    });
                }

                ui.add_space(6.0);
                if ui.button("Effacer l’historique").clicked() {
                    self.efface_historique();
                }
            });
    }

    /// Cadre à hauteur fixe (`lignes`), pour que la mise en page ne saute pas
    /// quand le résultat apparaît.
    fn cadre_resultat(ui: &mut egui::Ui, contenu: &str, lignes: usize) {
        let hauteur = lignes as f32 * ui.text_style_height(&egui::TextStyle::Monospace);
        egui::Frame::group(ui.style())
            .fill(ui.visuals().extreme_bg_color)
            .show(ui, |ui| {
                ui.set_min_size(egui::vec2(ui.available_width(), hauteur));
                ui.add(egui::Label::new(egui::RichText::new(contenu).monospace()).wrap());
            });
    }
}

/// Met en forme des chiffres tronqués : séparateurs de milliers, ou notation
/// scientifique pour une grande partie entière ou beaucoup de zéros après la virgule.
fn formate(chiffres: &str, r: &Resultat) -> String {
    let (signe, corps) = match chiffres.strip_prefix('-') {
        Some(c) => ("-", c),
        None => ("", chiffres),
    };
    let (entier, fraction) = corps.split_once('.').unwrap_or((corps, ""));

    if entier.len() > LONGUEUR_SCIENTIFIQUE {
        let mantisse = &entier[..CHIFFRES_MANTISSE];
        return format!(
            "{signe}{}.{}e{}",
            &mantisse[..1],
            &mantisse[1..],
            entier.len() - 1
        );
    }

    if entier == "0" && r.msd.is_some() {
        let zeros = fraction.bytes().take_while(|&b| b == b'0').count();
        let significatif = &fraction[zeros..];
        if zeros > ZEROS_TOLERES && !significatif.is_empty() {
            let queue = &significatif[1..significatif.len().min(CHIFFRES_MANTISSE)];
            return format!("{signe}{}.{queue}e-{}", &significatif[..1], zeros + 1);
        }
    }

    let groupe = groupe_milliers(entier);
    if fraction.is_empty() {
        format!("{signe}{groupe}")
    } else {
        format!("{signe}{groupe}.{fraction}")
    }
}

fn groupe_milliers(entier: &str) -> String {
    let mut out = String::with_capacity(entier.len() + entier.len() / 3);
    for (i, c) in entier.chars().enumerate() {
        if i > 0 && (entier.len() - i) % 3 == 0 {
            out.push(SEPARATEUR);
        }
        out.push(c);
    }
    out
}

#[derive(Clone, Copy, Debug)]
enum Action {
    Efface,
    Reinitialise,
    Retour,
}

const ACTIONS: [(&str, &str, Action); 3] = [
    ("C", "Efface l’expression", Action::Efface),
    ("AC", "Remise à zéro totale", Action::Reinitialise),
    ("DEL", "Retire le dernier symbole", Action::Retour),
];

const PAVE: [&str; 4] = ["789", "456", "123", "0."];

fn operateurs() -> Vec<Jeton> {
    vec![
        Jeton::ParOuvrante,
        Jeton::ParFermante,
        Jeton::Plus,
        Jeton::Moins,
        Jeton::Fois,
        Jeton::Divise,
        Jeton::Puissance,
        Jeton::Constante(Constante::Pi),
        Jeton::Constante(Constante::E),
    ]
}

fn fonctions() -> Vec<Jeton> {
    Fonction::TOUTES.into_iter().map(Jeton::Fonction).collect()
}
