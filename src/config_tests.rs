//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use crate::portfolio::OptimizationMethod;
    use crate::search::Objective;

    #[test]
    fn test_strategy_config_default() {
        let config = StrategyConfig::default();
        assert_eq!(config.place, 1);
        assert_eq!(config.kelly_trials, 100);
        assert_eq!(config.validation_days, 365);
        assert_eq!(config.annualization_factor, 365.0);
        assert_eq!(config.objective, Objective::Calmar);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.strategy.place, 1);
        assert_eq!(config.portfolio.min_distinct_values, 10);
        assert_eq!(config.portfolio.method, PortfolioMethod::MaxReturn);
        assert!(config.portfolio.max_volatility.is_none());
        assert_eq!(config.bets.lookahead_hours, 24);
        assert_eq!(config.storage.root, "~/.moneyball");
        assert!(config.runtime.fit_timeout_secs.is_none());
    }

    #[test]
    fn test_strategy_section() {
        let toml_str = r#"
[strategy]
place = 3
kelly_trials = 50
objective = "sharpe"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.strategy.place, 3);
        assert_eq!(config.strategy.kelly_trials, 50);
        assert_eq!(config.strategy.objective, Objective::Sharpe);
        // untouched fields keep their defaults
        assert_eq!(config.strategy.validation_days, 365);
    }

    #[test]
    fn test_portfolio_method_mapping() {
        let toml_str = r#"
method = "max_return"
max_volatility = 0.25
"#;
        let config: PortfolioConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.optimization_method(),
            OptimizationMethod::MaxReturn { max_volatility: Some(0.25) }
        );

        let config: PortfolioConfig = toml::from_str("method = \"risk_parity\"").unwrap();
        assert_eq!(config.optimization_method(), OptimizationMethod::RiskParity);
    }

    #[test]
    fn test_search_config_from_strategy() {
        let config = StrategyConfig {
            kelly_trials: 20,
            validation_days: 30,
            ..Default::default()
        };
        let search = config.search_config();
        assert_eq!(search.trials, 20);
        assert_eq!(search.validation_horizon, chrono::Duration::days(30));
    }

    #[test]
    fn test_walkforward_config_from_portfolio() {
        let config = PortfolioConfig {
            min_distinct_values: 4,
            method: PortfolioMethod::MinVariance,
            ..Default::default()
        };
        let wf = config.walkforward_config();
        assert_eq!(wf.min_distinct_values, 4);
        assert_eq!(wf.method, OptimizationMethod::MinVariance);
        assert_eq!(wf.annualization_factor, 365);
    }

    #[test]
    fn test_storage_root_expands_tilde() {
        let config = StorageConfig { root: "/tmp/moneyball".to_string() };
        assert_eq!(config.root_dir(), std::path::PathBuf::from("/tmp/moneyball"));

        let config = StorageConfig::default();
        assert!(!config.root_dir().to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.strategy.place, 1);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moneyball.toml");
        std::fs::write(&path, "[bets]\nlookahead_hours = 72\n").unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.bets.lookahead_hours, 72);
        assert_eq!(config.bets.lookahead(), chrono::Duration::hours(72));
    }
}
