use std::time::Duration;

use egui::Color32;
use egui_extras::{Column, TableBuilder};
use egui_plot::{Bar, BarChart, Plot};
use poll_promise::Promise;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{info, warn};
use trainbench_client::{ClientError, ModelType, TrainReport, TrainerClient, UploadReceipt};
use trainbench_workflow::{Effect, Severity, WorkflowState};

/// An in-flight request, tagged with the sequence number the workflow
/// expects echoed back with its outcome.
struct InFlight<T: Send + 'static> {
    seq: u64,
    promise: Promise<Result<T, ClientError>>,
}

pub struct StudioApp {
    client: TrainerClient,
    runtime: Handle,
    state: WorkflowState,
    probe: Option<Promise<Result<String, ClientError>>>,
    upload: Option<InFlight<UploadReceipt>>,
    train: Option<InFlight<TrainReport>>,
    predict: Option<InFlight<Value>>,
}

impl StudioApp {
    pub fn new(client: TrainerClient, runtime: Handle) -> Self {
        let mut app = Self {
            client,
            runtime,
            state: WorkflowState::default(),
            probe: None,
            upload: None,
            train: None,
            predict: None,
        };
        if let Some(effect) = app.state.initialize() {
            app.dispatch(effect);
        }
        app
    }

    /// Issue the request a controller operation asked for.
    fn dispatch(&mut self, effect: Effect) {
        let client = self.client.clone();
        let handle = self.runtime.clone();
        match effect {
            Effect::Probe => {
                self.probe = Some(Promise::spawn_thread("probe", move || {
                    handle.block_on(client.ping())
                }));
            }
            Effect::Upload {
                seq,
                file_name,
                bytes,
            } => {
                self.upload = Some(InFlight {
                    seq,
                    promise: Promise::spawn_thread("upload", move || {
                        handle.block_on(client.upload(&file_name, bytes))
                    }),
                });
            }
            Effect::Train { seq, request } => {
                self.train = Some(InFlight {
                    seq,
                    promise: Promise::spawn_thread("train", move || {
                        handle.block_on(client.train(&request))
                    }),
                });
            }
            Effect::Predict { seq, request } => {
                self.predict = Some(InFlight {
                    seq,
                    promise: Promise::spawn_thread("predict", move || {
                        handle.block_on(client.predict(&request))
                    }),
                });
            }
        }
    }

    /// Feed finished promises back into the workflow state.
    fn poll_inflight(&mut self) {
        if let Some(probe) = self.probe.take() {
            match probe.try_take() {
                Ok(Ok(reply)) => info!(reply = %reply.trim(), "service is reachable"),
                Ok(Err(err)) => warn!(error = %err, "service probe failed"),
                Err(promise) => self.probe = Some(promise),
            }
        }
        if let Some(inflight) = self.upload.take() {
            match inflight.promise.try_take() {
                Ok(outcome) => self.state.apply_upload_outcome(inflight.seq, outcome),
                Err(promise) => {
                    self.upload = Some(InFlight {
                        seq: inflight.seq,
                        promise,
                    })
                }
            }
        }
        if let Some(inflight) = self.train.take() {
            match inflight.promise.try_take() {
                Ok(outcome) => self.state.apply_train_outcome(inflight.seq, outcome),
                Err(promise) => {
                    self.train = Some(InFlight {
                        seq: inflight.seq,
                        promise,
                    })
                }
            }
        }
        if let Some(inflight) = self.predict.take() {
            match inflight.promise.try_take() {
                Ok(outcome) => self.state.apply_predict_outcome(inflight.seq, outcome),
                Err(promise) => {
                    self.predict = Some(InFlight {
                        seq: inflight.seq,
                        promise,
                    })
                }
            }
        }
    }

    fn has_inflight(&self) -> bool {
        self.probe.is_some()
            || self.upload.is_some()
            || self.train.is_some()
            || self.predict.is_some()
    }

    fn upload_stage(&mut self, ui: &mut egui::Ui) {
        ui.strong("1. Upload dataset");
        ui.horizontal(|ui| {
            if ui.button("Choose file").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Tabular data", &["csv", "xlsx"])
                    .pick_file()
                {
                    match std::fs::read(&path) {
                        Ok(bytes) => {
                            let name = path
                                .file_name()
                                .and_then(|s| s.to_str())
                                .unwrap_or("dataset")
                                .to_string();
                            self.state.select_file(name, bytes);
                        }
                        Err(err) => {
                            warn!(error = %err, path = %path.display(), "failed to read selected file")
                        }
                    }
                }
            }
            let chosen = self
                .state
                .pending_file()
                .map(|f| f.name.clone())
                .unwrap_or_else(|| "No file chosen".to_string());
            ui.label(chosen);

            let can_upload = self.state.pending_file().is_some() && self.upload.is_none();
            if ui
                .add_enabled(can_upload, egui::Button::new("Upload and Analyze"))
                .clicked()
            {
                if let Some(effect) = self.state.begin_upload() {
                    self.dispatch(effect);
                }
            }
        });
    }

    fn selection_stage(&mut self, ui: &mut egui::Ui) {
        ui.strong("2. Select features and target");
        if self.state.columns().is_empty() {
            ui.label("Upload a dataset to see its columns.");
            return;
        }
        let columns = self.state.columns().to_vec();

        ui.label("Features:");
        ui.horizontal_wrapped(|ui| {
            for column in &columns {
                let selected = self.state.features().iter().any(|f| f == column);
                let is_target = self.state.target() == Some(column.as_str());
                if ui
                    .add_enabled(!is_target, egui::SelectableLabel::new(selected, column))
                    .clicked()
                {
                    if let Err(err) = self.state.toggle_feature(column) {
                        warn!(error = %err, "feature selection rejected");
                    }
                }
            }
        });

        let current_target = self.state.target().unwrap_or("<none>").to_string();
        egui::ComboBox::from_label("Target")
            .selected_text(current_target)
            .show_ui(ui, |ui| {
                for column in &columns {
                    let is_feature = self.state.features().iter().any(|f| f == column);
                    let selected = self.state.target() == Some(column.as_str());
                    if ui
                        .add_enabled(!is_feature, egui::SelectableLabel::new(selected, column))
                        .clicked()
                    {
                        if let Err(err) = self.state.set_target(column) {
                            warn!(error = %err, "target selection rejected");
                        }
                    }
                }
            });
    }

    fn train_stage(&mut self, ui: &mut egui::Ui) {
        ui.strong("3. Choose model type and train");
        ui.horizontal(|ui| {
            let mut model_type = self.state.model_type();
            egui::ComboBox::from_label("Model type")
                .selected_text(model_type.to_string())
                .show_ui(ui, |ui| {
                    for candidate in ModelType::ALL {
                        ui.selectable_value(&mut model_type, candidate, candidate.as_str());
                    }
                });
            if model_type != self.state.model_type() {
                self.state.set_model_type(model_type);
            }

            let ready = !self.state.features().is_empty()
                && self.state.target().is_some()
                && !self.state.is_busy();
            if ui.add_enabled(ready, egui::Button::new("Train")).clicked() {
                if let Some(effect) = self.state.begin_train() {
                    self.dispatch(effect);
                }
            }
        });
    }

    fn status_banner(&self, ui: &mut egui::Ui) {
        if let Some(status) = self.state.status() {
            let color = match status.severity() {
                Severity::Error => Color32::RED,
                Severity::Success => Color32::DARK_GREEN,
            };
            ui.colored_label(color, status.text());
        }
    }

    fn results_stage(&self, ui: &mut egui::Ui) {
        if self.state.is_busy() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Waiting for the service...");
            });
            return;
        }
        let Some(report) = self.state.train_report() else {
            return;
        };

        ui.separator();
        ui.strong("Model results");
        if let Some(mse) = report.mse {
            ui.label(format!("Mean squared error: {mse}"));
        }

        if let Some(params) = &report.best_params {
            ui.add_space(4.0);
            ui.label("Best hyperparameters:");
            TableBuilder::new(ui)
                .striped(true)
                .column(Column::auto().at_least(140.0))
                .column(Column::remainder())
                .header(18.0, |mut header| {
                    header.col(|ui| {
                        ui.strong("Parameter");
                    });
                    header.col(|ui| {
                        ui.strong("Value");
                    });
                })
                .body(|mut body| {
                    for (name, value) in params {
                        body.row(18.0, |mut row| {
                            row.col(|ui| {
                                ui.label(name);
                            });
                            row.col(|ui| {
                                ui.label(value.to_string());
                            });
                        });
                    }
                });
        }

        let pairs = report.importance_pairs(self.state.features());
        if !pairs.is_empty() {
            ui.add_space(4.0);
            ui.label("Feature importances:");
            let labels: Vec<String> = pairs.iter().map(|(name, _)| name.clone()).collect();
            let bars: Vec<Bar> = pairs
                .iter()
                .enumerate()
                .map(|(i, (_, score))| Bar::new(i as f64, *score))
                .collect();
            Plot::new("feature_importances")
                .height(220.0)
                .x_axis_formatter(move |mark, _| {
                    let idx = mark.value.round() as usize;
                    labels.get(idx).cloned().unwrap_or_default()
                })
                .show(ui, |plot_ui| {
                    plot_ui.bar_chart(BarChart::new(bars));
                });
        }
    }

    fn predict_stage(&mut self, ui: &mut egui::Ui) {
        ui.strong("4. Predict");
        let features = self.state.features().to_vec();
        for feature in &features {
            let mut value = self
                .state
                .prediction_input()
                .get(feature)
                .cloned()
                .unwrap_or_default();
            ui.horizontal(|ui| {
                ui.label(feature);
                if ui.text_edit_singleline(&mut value).changed() {
                    self.state.update_prediction_input(feature.clone(), value.clone());
                }
            });
        }

        if ui
            .add_enabled(!self.state.is_busy(), egui::Button::new("Predict"))
            .clicked()
        {
            if let Some(effect) = self.state.begin_predict() {
                self.dispatch(effect);
            }
        }

        if let Some(prediction) = self.state.prediction() {
            ui.add_space(4.0);
            ui.label("Prediction:");
            let rendered = serde_json::to_string_pretty(prediction)
                .unwrap_or_else(|_| prediction.to_string());
            ui.monospace(rendered);
        }
    }
}

impl eframe::App for StudioApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_inflight();
        if self.has_inflight() {
            ctx.request_repaint_after(Duration::from_millis(200));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Model Trainer");
                ui.add_space(8.0);

                self.upload_stage(ui);
                ui.separator();
                self.selection_stage(ui);
                ui.separator();
                self.train_stage(ui);

                ui.add_space(8.0);
                self.status_banner(ui);
                self.results_stage(ui);

                if self.state.train_report().is_some() {
                    ui.separator();
                    self.predict_stage(ui);
                }
            });
        });
    }
}
