//! Volatility as the population standard deviation of log-returns.

/// Population stdev of consecutive log-returns.
///
/// Pairs containing a non-positive price are skipped. Returns 0.0 with fewer
/// than 3 prices or fewer than 2 usable returns.
pub fn volatility_from_log_returns(prices: &[f64]) -> f64 {
    if prices.len() < 3 {
        return 0.0;
    }

    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect();

    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
