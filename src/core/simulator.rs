use super::types::{SimulationInput, SimulationResult, YearBreakdown};

/// Projects compound growth of `initial_amount` at `annual_rate` percent for `years`.
///
/// Money is rounded to cents and ROI to one decimal place. Every yearly amount is
/// computed from the principal rather than accumulated, so the last breakdown entry
/// always matches `final_amount`.
pub fn run_simulation(input: &SimulationInput) -> SimulationResult {
    let growth_factor = 1.0 + input.annual_rate / 100.0;
    let final_amount = compound(input.initial_amount, growth_factor, input.years);
    let total_return = final_amount - input.initial_amount;
    let roi_percentage = total_return / input.initial_amount * 100.0;

    let yearly_breakdown = (1..=input.years)
        .map(|year| {
            let amount = compound(input.initial_amount, growth_factor, year);
            YearBreakdown {
                year,
                amount: round_to(amount, 2),
                growth: round_to(amount - input.initial_amount, 2),
            }
        })
        .collect();

    SimulationResult {
        initial_amount: input.initial_amount,
        annual_rate: input.annual_rate,
        years: input.years,
        final_amount: round_to(final_amount, 2),
        total_return: round_to(total_return, 2),
        roi_percentage: round_to(roi_percentage, 1),
        yearly_breakdown,
    }
}

fn compound(principal: f64, growth_factor: f64, years: u32) -> f64 {
    principal * growth_factor.powf(f64::from(years))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
