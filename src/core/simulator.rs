use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::{LoopSettings, YearPlan, project};
use super::types::{Field, ProjectionInputs, YearRecord};
use super::validate::{ValidationError, non_negative, within};

pub const MAX_PATHS: u32 = 100_000;

/// Market regimes offered by the scenario simulator.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    #[serde(alias = "optimistic")]
    Bull,
    #[serde(alias = "realistic")]
    Balanced,
    #[serde(alias = "pessimistic")]
    Bear,
    Stagflation,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioParams {
    pub market_volatility: f64,
    pub dividend_growth_rate: f64,
    pub inflation_rate: f64,
}

impl Scenario {
    /// Preset parameters, or `None` for a custom scenario.
    pub fn params(self) -> Option<ScenarioParams> {
        let (market_volatility, dividend_growth_rate, inflation_rate) = match self {
            Scenario::Bull => (0.12, 0.08, 0.02),
            Scenario::Balanced => (0.18, 0.05, 0.03),
            Scenario::Bear => (0.35, 0.01, 0.05),
            Scenario::Stagflation => (0.25, -0.02, 0.08),
            Scenario::Custom => return None,
        };
        Some(ScenarioParams {
            market_volatility,
            dividend_growth_rate,
            inflation_rate,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub paths: u32,
    pub seed: u64,
    pub scenario: Scenario,
    /// Used by `Scenario::Custom`; presets carry their own.
    pub market_volatility: f64,
    pub growth_volatility: f64,
    pub inflation_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            paths: 1_000,
            seed: 42,
            scenario: Scenario::Custom,
            market_volatility: 0.18,
            growth_volatility: 0.01,
            inflation_rate: 0.03,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Band {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedYear {
    pub year: u32,
    pub ending_balance: Band,
    pub real_ending_balance: Band,
    pub dividends_net: Band,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub scenario: Scenario,
    pub paths: u32,
    pub seed: u64,
    pub market_volatility: f64,
    pub dividend_growth_rate: f64,
    pub inflation_rate: f64,
    pub final_balance: Band,
    pub real_final_balance: Band,
    pub mean_final_balance: f64,
    pub years: Vec<SimulatedYear>,
}

pub fn validate_config(config: &SimulationConfig) -> Result<(), ValidationError> {
    if config.paths == 0 || config.paths > MAX_PATHS {
        return Err(ValidationError::OutOfRange {
            field: Field::Paths,
            min: 1.0,
            max: MAX_PATHS as f64,
        });
    }
    within(
        non_negative(config.market_volatility, Field::MarketVolatility)?,
        Field::MarketVolatility,
        0.0,
        1.0,
    )?;
    within(
        non_negative(config.growth_volatility, Field::GrowthVolatility)?,
        Field::GrowthVolatility,
        0.0,
        1.0,
    )?;
    within(config.inflation_rate, Field::InflationRate, -0.05, 0.5)?;
    Ok(())
}

/// Runs the projection engine once per path over randomly perturbed yields.
pub fn simulate(
    inputs: &ProjectionInputs,
    config: &SimulationConfig,
) -> Result<SimulationReport, ValidationError> {
    validate_config(config)?;

    let params = config.scenario.params().unwrap_or(ScenarioParams {
        market_volatility: config.market_volatility,
        dividend_growth_rate: inputs.dividend_growth_rate,
        inflation_rate: config.inflation_rate,
    });
    debug!(?params, paths = config.paths, seed = config.seed, "starting simulation");

    let settings = LoopSettings::from_inputs(inputs);
    let years = inputs.horizon_years as usize;
    let paths = config.paths as usize;

    let mut ending = vec![Vec::with_capacity(paths); years];
    let mut real_ending = vec![Vec::with_capacity(paths); years];
    let mut dividends = vec![Vec::with_capacity(paths); years];
    let mut finals = Vec::with_capacity(paths);
    let mut real_finals = Vec::with_capacity(paths);

    for path in 0..config.paths {
        let mut rng = Rng::new(derive_seed(config.seed, path));
        let plans = sample_plans(inputs, &params, config.growth_volatility, &mut rng);
        let records = project(&settings, &plans, None);
        for (index, record) in records.iter().enumerate() {
            let real = deflate(record, params.inflation_rate);
            ending[index].push(record.ending_balance);
            real_ending[index].push(real);
            dividends[index].push(record.dividends_net);
        }
        if let Some(last) = records.last() {
            finals.push(last.ending_balance);
            real_finals.push(deflate(last, params.inflation_rate));
        }
    }

    let mean_final_balance = if finals.is_empty() {
        0.0
    } else {
        finals.iter().sum::<f64>() / finals.len() as f64
    };

    let years = (0..years)
        .map(|index| SimulatedYear {
            year: index as u32 + 1,
            ending_balance: band(&mut ending[index]),
            real_ending_balance: band(&mut real_ending[index]),
            dividends_net: band(&mut dividends[index]),
        })
        .collect();

    Ok(SimulationReport {
        scenario: config.scenario,
        paths: config.paths,
        seed: config.seed,
        market_volatility: params.market_volatility,
        dividend_growth_rate: params.dividend_growth_rate,
        inflation_rate: params.inflation_rate,
        final_balance: band(&mut finals),
        real_final_balance: band(&mut real_finals),
        mean_final_balance,
        years,
    })
}

fn sample_plans(
    inputs: &ProjectionInputs,
    params: &ScenarioParams,
    growth_volatility: f64,
    rng: &mut Rng,
) -> Vec<YearPlan> {
    let mut plans = Vec::with_capacity(inputs.horizon_years as usize);
    let mut trend_yield = inputs.annual_dividend_yield;
    for year in 1..=inputs.horizon_years {
        if year > 1 {
            let growth = (params.dividend_growth_rate + growth_volatility * rng.standard_normal())
                .clamp(-0.95, 1.0);
            trend_yield *= 1.0 + growth;
        }
        let market = 1.0 + params.market_volatility * rng.standard_normal();
        plans.push(YearPlan {
            yield_rate: (trend_yield * market).max(0.0),
            monthly_contribution: inputs.periodic_contribution,
        });
    }
    plans
}

fn deflate(record: &YearRecord, inflation_rate: f64) -> f64 {
    record.ending_balance / (1.0 + inflation_rate).powi(record.year as i32)
}

fn band(values: &mut [f64]) -> Band {
    Band {
        p10: percentile(values, 10.0),
        p50: percentile(values, 50.0),
        p90: percentile(values, 90.0),
    }
}

fn derive_seed(base_seed: u64, path: u32) -> u64 {
    splitmix64(base_seed ^ ((path as u64) << 32))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

struct Rng {
    state: u64,
    cached_normal: Option<f64>,
}

impl Rng {
    fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self {
            state,
            cached_normal: None,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    fn next_f64(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        let v = self.next_u64() >> 11;
        ((v as f64) + 0.5) / DENOM
    }

    fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.cached_normal.take() {
            return z;
        }

        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;

        self.cached_normal = Some(r * theta.sin());
        r * theta.cos()
    }
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}
