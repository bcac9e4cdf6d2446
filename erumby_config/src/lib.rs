#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and encoder calibration parsing for the vehicle.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The encoder calibration CSV loader enforces exact headers and strictly
//!   increasing pulse counts.
use serde::Deserialize;
use serde::de::Deserializer;

/// Encoder calibration CSV schema.
///
/// Expected headers:
/// pulses,speed_mps
///
/// Example:
/// pulses,speed_mps
/// 0,0.0
/// 12,3.1
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct CalibrationRow {
    pub pulses: f32,
    pub speed_mps: f32,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Pins {
    /// BCM pin counting wheel-encoder edges
    pub encoder: u8,
    /// Hardware PWM channel (0/1) driving the ESC
    pub esc_pwm: u8,
    /// Hardware PWM channel (0/1) driving the steering servo
    pub servo_pwm: u8,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Timing {
    pub period_ms: u32,
    pub dead_time_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            period_ms: 4,
            dead_time_ms: 80,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ControlCfg {
    pub kp: f32,
    pub ki: f32,
    pub output_min: f32,
    pub output_max: f32,
    /// Add the inverse model of the setpoint to the PI action
    pub feedforward: bool,
    /// |estimate| above this (m/s) is a numerical fault
    pub divergence_limit: f32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.1,
            output_min: 0.0,
            output_max: 1.0,
            feedforward: true,
            divergence_limit: 1.0e3,
        }
    }
}

/// Wiener model: pole `a` and output nonlinearity `w -> nonlin_a w + nonlin_b w^2`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ModelCfg {
    pub a: f32,
    pub nonlin_a: f32,
    pub nonlin_b: f32,
}

impl Default for ModelCfg {
    fn default() -> Self {
        Self {
            a: 1.0,
            nonlin_a: 1.0,
            nonlin_b: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ObserverCfg {
    /// l1..ln; length sets the state size
    pub gains: Vec<f32>,
    pub epsilon: f32,
    /// Drift on the first state: -a x - nonlin_a x|x| - nonlin_b x^3
    pub a: f32,
    pub nonlin_a: f32,
    pub nonlin_b: f32,
}

impl Default for ObserverCfg {
    fn default() -> Self {
        Self {
            gains: vec![2.0, 1.0],
            epsilon: 0.05,
            a: 0.0,
            nonlin_a: 0.0,
            nonlin_b: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TablePolicy {
    #[default]
    Clamp,
    Extrapolate,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EncoderCfg {
    /// Pulses per tick -> m/s. Accepts either:
    /// - array of tuples: [[0, 0.0], [40, 10.0]]
    /// - array of tables: [{ pulses = 0, speed_mps = 0.0 }, ...]
    #[serde(deserialize_with = "de_points")]
    pub table: Vec<(f32, f32)>,
    pub policy: TablePolicy,
}

impl Default for EncoderCfg {
    fn default() -> Self {
        Self {
            table: vec![(0.0, 0.0), (40.0, 10.0)],
            policy: TablePolicy::Clamp,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct EscCfg {
    pub min_us: u16,
    pub idle_us: u16,
    pub max_us: u16,
}

impl Default for EscCfg {
    fn default() -> Self {
        Self {
            min_us: 1000,
            idle_us: 1500,
            max_us: 2032,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ServoCfg {
    pub right_us: u16,
    pub center_us: u16,
    pub left_us: u16,
}

impl Default for ServoCfg {
    fn default() -> Self {
        Self {
            right_us: 1052,
            center_us: 1476,
            left_us: 1890,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RadioCfg {
    pub auto_us: u16,
    pub secure_us: u16,
    pub manual_us: u16,
    pub tolerance_us: u16,
    /// Fall back to secure after this long without a frame
    pub failsafe_ms: u64,
    pub read_timeout_ms: u64,
    /// Manual-mode stick maps (radio us -> actuator us). Default: pass-through.
    #[serde(deserialize_with = "de_opt_points")]
    pub throttle_table: Option<Vec<(f32, f32)>>,
    #[serde(deserialize_with = "de_opt_points")]
    pub steering_table: Option<Vec<(f32, f32)>>,
}

impl Default for RadioCfg {
    fn default() -> Self {
        Self {
            auto_us: 2024,
            secure_us: 1504,
            manual_us: 980,
            tolerance_us: 100,
            failsafe_ms: 100,
            read_timeout_ms: 30,
            throttle_table: None,
            steering_table: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Offline plant used by `erumby simulate`.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SimCfg {
    pub pulses_per_meter: f32,
    /// Plant/model gain mismatch; 1.0 is a perfect model
    pub gain: f32,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            pulses_per_meter: 1000.0,
            gain: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub controller: ControlCfg,
    #[serde(default)]
    pub model: ModelCfg,
    /// ESC-response model; defaults to a faster linear lag when absent
    #[serde(default)]
    pub esc_model: Option<ModelCfg>,
    #[serde(default)]
    pub observer: ObserverCfg,
    #[serde(default)]
    pub encoder: EncoderCfg,
    #[serde(default)]
    pub esc: EscCfg,
    #[serde(default)]
    pub servo: ServoCfg,
    #[serde(default)]
    pub radio: RadioCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub sim: SimCfg,
    #[serde(default)]
    pub pins: Option<Pins>,
}

/// Upper bound on the dead time in ticks; sizes the predictor buffers.
pub const MAX_DELAY_TICKS: u32 = 10_000;

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PointToml {
    Tuple((f32, f32)),
    Encoder { pulses: f32, speed_mps: f32 },
    Xy { x: f32, y: f32 },
}

impl From<PointToml> for (f32, f32) {
    fn from(p: PointToml) -> Self {
        match p {
            PointToml::Tuple(t) => t,
            PointToml::Encoder { pulses, speed_mps } => (pulses, speed_mps),
            PointToml::Xy { x, y } => (x, y),
        }
    }
}

fn de_points<'de, D>(deserializer: D) -> Result<Vec<(f32, f32)>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<PointToml> = Vec::deserialize(deserializer)?;
    Ok(items.into_iter().map(Into::into).collect())
}

fn de_opt_points<'de, D>(deserializer: D) -> Result<Option<Vec<(f32, f32)>>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<Vec<PointToml>> = Option::deserialize(deserializer)?;
    Ok(opt.map(|v| v.into_iter().map(Into::into).collect()))
}

/// Calibrated encoder curve loaded from CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderCalibration {
    pub points: Vec<(f32, f32)>,
}

impl EncoderCalibration {
    pub fn from_rows(rows: &[CalibrationRow]) -> eyre::Result<Self> {
        if rows.len() < 2 {
            eyre::bail!("calibration requires at least two rows, got {}", rows.len());
        }
        for (i, r) in rows.iter().enumerate() {
            if !(r.pulses.is_finite() && r.speed_mps.is_finite()) {
                eyre::bail!("calibration row {} is not finite", i + 2);
            }
        }
        for i in 1..rows.len() {
            if rows[i].pulses <= rows[i - 1].pulses {
                eyre::bail!(
                    "calibration pulses must be strictly increasing (rows {} and {})",
                    i + 1,
                    i + 2
                );
            }
        }
        Ok(Self {
            points: rows.iter().map(|r| (r.pulses, r.speed_mps)).collect(),
        })
    }
}

impl TryFrom<Vec<CalibrationRow>> for EncoderCalibration {
    type Error = eyre::Report;
    fn try_from(rows: Vec<CalibrationRow>) -> Result<Self, Self::Error> {
        Self::from_rows(&rows)
    }
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<EncoderCalibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["pulses", "speed_mps"];
    let actual: Vec<String> = headers.iter().map(ToString::to_string).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'pulses,speed_mps', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    EncoderCalibration::try_from(rows)
}

fn check_points(name: &str, pts: &[(f32, f32)]) -> eyre::Result<()> {
    if pts.len() < 2 {
        eyre::bail!("{name} needs at least two points");
    }
    if pts.iter().any(|(x, y)| !(x.is_finite() && y.is_finite())) {
        eyre::bail!("{name} points must be finite");
    }
    if pts.windows(2).any(|w| w[1].0 <= w[0].0) {
        eyre::bail!("{name} inputs must be strictly increasing");
    }
    Ok(())
}

fn check_model(name: &str, m: &ModelCfg) -> eyre::Result<()> {
    if !(m.a.is_finite() && m.a > 0.0) {
        eyre::bail!("{name}.a must be > 0");
    }
    if !(m.nonlin_a.is_finite() && m.nonlin_a >= 0.0) {
        eyre::bail!("{name}.nonlin_a must be >= 0");
    }
    if !(m.nonlin_b.is_finite() && m.nonlin_b >= 0.0) {
        eyre::bail!("{name}.nonlin_b must be >= 0");
    }
    if m.nonlin_a == 0.0 && m.nonlin_b == 0.0 {
        eyre::bail!("{name}.nonlin_a and {name}.nonlin_b must not both be 0");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Timing
        if self.timing.period_ms == 0 {
            eyre::bail!("timing.period_ms must be > 0");
        }
        if self.timing.dead_time_ms == 0 {
            eyre::bail!("timing.dead_time_ms must be > 0");
        }
        if self.timing.dead_time_ms % self.timing.period_ms != 0 {
            eyre::bail!("timing.dead_time_ms must be a multiple of timing.period_ms");
        }
        if self.timing.dead_time_ms / self.timing.period_ms > MAX_DELAY_TICKS {
            eyre::bail!("timing.dead_time_ms must span at most {MAX_DELAY_TICKS} periods");
        }

        // Controller
        let c = &self.controller;
        if !(c.kp.is_finite() && c.kp >= 0.0) {
            eyre::bail!("controller.kp must be >= 0");
        }
        if !(c.ki.is_finite() && c.ki >= 0.0) {
            eyre::bail!("controller.ki must be >= 0");
        }
        if !(c.output_min.is_finite() && c.output_max.is_finite()) || c.output_min >= c.output_max
        {
            eyre::bail!("controller.output_min must be < controller.output_max");
        }
        if c.output_min < 0.0 || c.output_max > 1.0 {
            eyre::bail!("controller.output_min and controller.output_max must lie within [0, 1]");
        }
        if !(c.divergence_limit.is_finite() && c.divergence_limit > 0.0) {
            eyre::bail!("controller.divergence_limit must be > 0");
        }

        // Models
        check_model("model", &self.model)?;
        if let Some(m) = &self.esc_model {
            check_model("esc_model", m)?;
        }

        // Observer
        let o = &self.observer;
        if o.gains.len() < 2 {
            eyre::bail!("observer.gains must have at least two entries");
        }
        if o.gains.iter().any(|l| !(l.is_finite() && *l > 0.0)) {
            eyre::bail!("observer.gains must all be > 0");
        }
        if !(o.epsilon > 0.0 && o.epsilon <= 1.0) {
            eyre::bail!("observer.epsilon must be in (0.0, 1.0]");
        }
        if [o.a, o.nonlin_a, o.nonlin_b]
            .iter()
            .any(|v| !(v.is_finite() && *v >= 0.0))
        {
            eyre::bail!("observer.a, observer.nonlin_a and observer.nonlin_b must be >= 0");
        }

        // Encoder
        check_points("encoder.table", &self.encoder.table)?;

        // Actuators
        let e = &self.esc;
        if !(e.min_us <= e.idle_us && e.idle_us < e.max_us) {
            eyre::bail!("esc must satisfy min_us <= idle_us < max_us");
        }
        let s = &self.servo;
        let increasing = s.right_us < s.center_us && s.center_us < s.left_us;
        let decreasing = s.right_us > s.center_us && s.center_us > s.left_us;
        if !(increasing || decreasing) {
            eyre::bail!("servo.center_us must lie strictly between servo.right_us and servo.left_us");
        }

        // Radio
        let r = &self.radio;
        let centres = [r.auto_us, r.secure_us, r.manual_us];
        let width = u32::from(r.tolerance_us) * 2;
        for (i, a) in centres.iter().enumerate() {
            for b in &centres[i + 1..] {
                if u32::from(a.abs_diff(*b)) <= width {
                    eyre::bail!("radio mode bands overlap; reduce radio.tolerance_us");
                }
            }
        }
        if r.failsafe_ms == 0 {
            eyre::bail!("radio.failsafe_ms must be >= 1");
        }
        if r.read_timeout_ms == 0 {
            eyre::bail!("radio.read_timeout_ms must be >= 1");
        }
        if let Some(t) = &r.throttle_table {
            check_points("radio.throttle_table", t)?;
        }
        if let Some(t) = &r.steering_table {
            check_points("radio.steering_table", t)?;
        }

        // Simulation
        if !(self.sim.pulses_per_meter.is_finite() && self.sim.pulses_per_meter > 0.0) {
            eyre::bail!("sim.pulses_per_meter must be > 0");
        }
        if !(self.sim.gain.is_finite() && self.sim.gain > 0.0) {
            eyre::bail!("sim.gain must be > 0");
        }

        Ok(())
    }
}
