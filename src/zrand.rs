use log::debug;
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

/// RandMode controls random generator behaviour. May be predictable for testing or truly random for gameplay
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RandMode {
    Predictable(u64),
    RandomUniform,
}

pub struct ZRand {
    rng: Box<dyn RngCore>,
    rand_mode: RandMode,
}

impl ZRand {
    pub fn new(rm: RandMode) -> ZRand {
        match rm {
            RandMode::Predictable(seed) => ZRand::new_predictable(seed),
            RandMode::RandomUniform => ZRand::new_uniform(),
        }
    }

    pub fn new_uniform() -> ZRand {
        ZRand {
            rng: Box::new(StdRng::from_entropy()),
            rand_mode: RandMode::RandomUniform,
        }
    }

    pub fn new_predictable(seed: u64) -> ZRand {
        ZRand {
            rng: Box::new(StdRng::seed_from_u64(seed)),
            rand_mode: RandMode::Predictable(seed),
        }
    }

    pub fn mode(&self) -> RandMode {
        self.rand_mode
    }

    /// The `random` opcode. A positive range yields a value in `[1, range]`;
    /// a negative range reseeds predictably from its magnitude and a zero
    /// range reseeds from entropy, both yielding 0.
    pub fn random(&mut self, range: i16) -> u16 {
        match range {
            r if r > 0 => self.rng.gen_range(1..=r as u16),
            0 => {
                debug!("random: reseeding from entropy");
                *self = ZRand::new_uniform();
                0
            }
            r => {
                let seed = (r as i32).unsigned_abs() as u64;
                debug!("random: predictable seed {}", seed);
                *self = ZRand::new_predictable(seed);
                0
            }
        }
    }
}
