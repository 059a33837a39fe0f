// src/gui.rs
use blinkstick::BlinkEngine;
use eframe::egui;
use egui::{Color32, Pos2, Stroke};
use egui_plot::{HLine, Line, Plot, PlotPoints};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const WIDTH: f32 = 520.0;
pub const HEIGHT: f32 = 720.0;
const PLOT_HEIGHT: f32 = 140.0;
const HISTORY_LEN: usize = 300;

/// Ball physics, tuned per 60 Hz frame.
#[derive(Debug, Clone, Copy)]
pub struct BallState {
    pub y: f32,
    pub vy: f32,
}

impl BallState {
    pub const RADIUS: f32 = 22.0;
    const GRAVITY: f32 = 0.18;
    const BOOST: f32 = -8.0;
    const DAMPING: f32 = 0.995;

    pub fn new(floor: f32) -> Self {
        Self {
            y: (Self::top() + Self::bottom(floor)) * 0.5,
            vy: 0.0,
        }
    }

    fn top() -> f32 {
        Self::RADIUS + 10.0
    }

    fn bottom(floor: f32) -> f32 {
        floor - Self::RADIUS - 10.0
    }

    pub fn boost(&mut self) {
        self.vy = Self::BOOST;
    }

    /// Advances `frames` 60 Hz frames; the ball stops dead at either limit.
    pub fn step(&mut self, frames: f32, floor: f32) {
        self.vy = (self.vy + Self::GRAVITY * frames) * Self::DAMPING.powf(frames);
        self.y += self.vy * frames;
        if self.y > Self::bottom(floor) {
            self.y = Self::bottom(floor);
            self.vy = 0.0;
        }
        if self.y < Self::top() {
            self.y = Self::top();
            self.vy = 0.0;
        }
    }
}

pub struct BlinkBallApp {
    engine: BlinkEngine,
    sim_trigger: Option<Arc<AtomicBool>>,
    ball: BallState,
    peaks: VecDeque<f64>,
    blinks: usize,
}

impl BlinkBallApp {
    pub fn new(engine: BlinkEngine, sim_trigger: Option<Arc<AtomicBool>>) -> Self {
        Self {
            engine,
            sim_trigger,
            ball: BallState::new(HEIGHT - PLOT_HEIGHT),
            peaks: VecDeque::with_capacity(HISTORY_LEN),
            blinks: 0,
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let (space, retrain, inject, quit) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Space),
                i.key_pressed(egui::Key::T),
                i.key_pressed(egui::Key::B),
                i.key_pressed(egui::Key::Escape),
            )
        });
        if space {
            self.ball.boost();
        }
        if retrain {
            log::info!("retrain requested from keyboard");
            self.engine.request_retrain();
        }
        if inject {
            if let Some(trigger) = &self.sim_trigger {
                trigger.store(true, Ordering::SeqCst);
            }
        }
        if quit {
            self.engine.shutdown();
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn draw_hud(&self, ui: &mut egui::Ui) {
        let snap = self.engine.status();
        let help = if self.sim_trigger.is_some() {
            "Blink=up | Space=up | T=retrain | B=sim blink | ESC=quit"
        } else {
            "Blink=up | Space=up | T=retrain | ESC=quit"
        };
        ui.label(help);
        ui.label(format!("EEG: {}", snap.status));
        ui.label(format!("Peak: {:.1}  Ratio: {:.2}", snap.peak, snap.ratio));
        ui.label(format!("Thresh: {:.1}  Armed: {}", snap.threshold, snap.armed));
        ui.label(format!("Blinks: {}", self.blinks));
    }

    fn draw_trace(&self, ui: &mut egui::Ui) {
        let points: Vec<[f64; 2]> = self
            .peaks
            .iter()
            .enumerate()
            .map(|(i, p)| [i as f64, *p])
            .collect();
        Plot::new("peak_trace")
            .height(PLOT_HEIGHT - 20.0)
            .include_y(0.0)
            .include_x(0.0)
            .include_x(HISTORY_LEN as f64)
            .allow_drag(false)
            .allow_zoom(false)
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(PlotPoints::new(points))
                        .name("peak")
                        .color(Color32::from_rgb(0, 255, 255)),
                );
                plot_ui.hline(
                    HLine::new(self.engine.threshold())
                        .name("threshold")
                        .color(Color32::YELLOW),
                );
            });
    }
}

impl eframe::App for BlinkBallApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);

        if self.engine.poll_event() {
            self.blinks += 1;
            self.ball.boost();
        }
        let frames = ctx.input(|i| i.stable_dt) * 60.0;
        self.ball.step(frames.clamp(0.0, 4.0), HEIGHT - PLOT_HEIGHT);

        if self.peaks.len() == HISTORY_LEN {
            self.peaks.pop_front();
        }
        self.peaks.push_back(self.engine.peak());

        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = Color32::from_rgb(10, 10, 15);
        ctx.set_visuals(visuals);

        egui::TopBottomPanel::bottom("trace")
            .exact_height(PLOT_HEIGHT)
            .show(ctx, |ui| self.draw_trace(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            let rect = ui.max_rect();
            let center = Pos2::new(rect.center().x, rect.top() + self.ball.y);
            let fill = if self.engine.is_armed() {
                Color32::from_rgb(80, 200, 255)
            } else {
                Color32::from_rgb(90, 90, 110)
            };
            ui.painter().circle_filled(center, BallState::RADIUS, fill);
            ui.painter()
                .circle_stroke(center, BallState::RADIUS, Stroke::new(1.5, Color32::WHITE));
            self.draw_hud(ui);
        });

        ctx.request_repaint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOOR: f32 = 580.0;

    #[test]
    fn ball_falls_and_rests_on_floor() {
        let mut ball = BallState::new(FLOOR);
        for _ in 0..600 {
            ball.step(1.0, FLOOR);
        }
        assert_eq!(ball.y, FLOOR - BallState::RADIUS - 10.0);
        assert_eq!(ball.vy, 0.0);
    }

    #[test]
    fn boost_lifts_ball_and_ceiling_stops_it() {
        let mut ball = BallState::new(FLOOR);
        let start = ball.y;
        ball.boost();
        ball.step(1.0, FLOOR);
        assert!(ball.y < start);
        for _ in 0..40 {
            ball.boost();
            ball.step(1.0, FLOOR);
        }
        assert_eq!(ball.y, BallState::RADIUS + 10.0);
        assert_eq!(ball.vy, 0.0);
    }
}
