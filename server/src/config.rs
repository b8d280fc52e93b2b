use crate::game::GameConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{BROADCAST_TICK_MS, MAX_PLAYERS, MIN_PLAYERS, SERVER_TICK_MS};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Port cannot be 0")]
    ZeroPort,
    #[error("{0} must be at least 1ms")]
    ZeroInterval(&'static str),
    #[error("broadcast interval ({broadcast}ms) is shorter than the tick ({tick}ms)")]
    BroadcastFasterThanTick { tick: u64, broadcast: u64 },
    #[error("min_players ({min}) must be between 1 and max_players ({max})")]
    PlayerBounds { min: usize, max: usize },
    #[error("{ai} AI players leave no room under max_players ({max})")]
    TooManyBots { ai: usize, max: usize },
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Simulation tick
    pub tick_ms: u64,
    /// Snapshot broadcast interval
    pub broadcast_ms: u64,
    pub max_players: usize,
    pub min_players: usize,
    pub ai_players: usize,
    /// Fixed world seed; entropy when absent
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            tick_ms: SERVER_TICK_MS,
            broadcast_ms: BROADCAST_TICK_MS,
            max_players: MAX_PLAYERS,
            min_players: MIN_PLAYERS,
            ai_players: 0,
            seed: None,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroInterval("tick"));
        }
        if self.broadcast_ms == 0 {
            return Err(ConfigError::ZeroInterval("broadcast"));
        }
        if self.broadcast_ms < self.tick_ms {
            return Err(ConfigError::BroadcastFasterThanTick {
                tick: self.tick_ms,
                broadcast: self.broadcast_ms,
            });
        }
        if self.min_players == 0 || self.min_players > self.max_players {
            return Err(ConfigError::PlayerBounds {
                min: self.min_players,
                max: self.max_players,
            });
        }
        if self.ai_players >= self.max_players {
            return Err(ConfigError::TooManyBots {
                ai: self.ai_players,
                max: self.max_players,
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn game_config(&self) -> GameConfig {
        GameConfig {
            min_players: self.min_players,
            max_players: self.max_players,
            ..GameConfig::default()
        }
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.tick_ms, SERVER_TICK_MS);
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroPort));

        let config = ServerConfig {
            broadcast_ms: 5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BroadcastFasterThanTick { .. })
        ));

        let config = ServerConfig {
            min_players: 11,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::PlayerBounds { .. })));

        let config = ServerConfig {
            ai_players: MAX_PLAYERS,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::TooManyBots { .. })));
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let config = ServerConfig {
            seed: Some(42),
            ..Default::default()
        };
        let a: u64 = config.rng().gen();
        let b: u64 = config.rng().gen();
        assert_eq!(a, b);
    }

    #[test]
    fn test_game_config_carries_player_bounds() {
        let config = ServerConfig {
            min_players: 3,
            max_players: 6,
            ..Default::default()
        };
        let game = config.game_config();
        assert_eq!(game.min_players, 3);
        assert_eq!(game.max_players, 6);
    }
}
