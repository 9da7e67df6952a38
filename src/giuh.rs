//! GIUH routing (spec §4.K): convolves surface runoff through a fixed set
//! of geomorphological unit-hydrograph ordinates.
//!
//! Grounded on the shift-and-accumulate FIR queue used for the UH1/UH2
//! arrays in the Kalix GR4J rainfall-runoff node: a runoff pulse is
//! distributed across future time steps by the ordinate weights, and each
//! call pops the oldest accumulated share off the front of the queue.

#[derive(Debug, Clone, Default)]
pub struct GiuhBuffer {
    ordinates: Vec<f64>,
    queue: Vec<f64>,
}

impl GiuhBuffer {
    /// `ordinates` are the GIUH weights, oldest lag first; they are
    /// normalized to sum to 1 so the buffer conserves the runoff volume
    /// passed through it.
    pub fn new(ordinates: Vec<f64>) -> Self {
        let total: f64 = ordinates.iter().sum();
        let normalized = if total > 0.0 {
            ordinates.iter().map(|o| o / total).collect()
        } else {
            ordinates
        };
        let len = normalized.len();
        Self {
            ordinates: normalized,
            queue: vec![0.0; len],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ordinates.is_empty()
    }

    /// Folds `runoff_cm` into the queue and returns the routed discharge
    /// due this step. With no ordinates configured, routing is a no-op and
    /// runoff passes straight through.
    pub fn convolve(&mut self, runoff_cm: f64) -> f64 {
        if self.ordinates.is_empty() {
            return runoff_cm;
        }

        for (i, ordinate) in self.ordinates.iter().enumerate() {
            self.queue[i] += runoff_cm * ordinate;
        }

        let due = self.queue.remove(0);
        self.queue.push(0.0);
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn empty_ordinates_pass_through() {
        let mut buf = GiuhBuffer::new(vec![]);
        assert_eq!(buf.convolve(1.5), 1.5);
    }

    #[test]
    fn ordinates_are_normalized_and_conserve_volume() {
        let mut buf = GiuhBuffer::new(vec![1.0, 1.0, 2.0]);
        let mut total = 0.0;
        total += buf.convolve(4.0);
        total += buf.convolve(0.0);
        total += buf.convolve(0.0);
        total += buf.convolve(0.0);
        assert_abs_diff_eq!(total, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn single_pulse_spreads_across_steps_in_ordinate_proportion() {
        let mut buf = GiuhBuffer::new(vec![0.5, 0.3, 0.2]);
        let first = buf.convolve(10.0);
        assert_abs_diff_eq!(first, 5.0, epsilon = 1e-9);
        let second = buf.convolve(0.0);
        assert_abs_diff_eq!(second, 3.0, epsilon = 1e-9);
        let third = buf.convolve(0.0);
        assert_abs_diff_eq!(third, 2.0, epsilon = 1e-9);
    }
}
