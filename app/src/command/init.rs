use parley_config::Config;

/// Writes the template config to `~/parley/config.json`.
#[derive(Debug, Clone, Copy)]
pub struct InitStrategy;

impl super::CommandStrategy for InitStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let path = Config::create_config()?;

        println!("Created config file at: {}", path.display());
        println!();
        println!("Next steps:");
        println!("   1. Edit the config file and add your API key");
        println!("   2. Run 'parley info' to check the settings and database");
        println!("   3. Run 'parley chat' to start a conversation");
        println!();
        println!("Configuration options:");
        println!("   - providers.default: zhipu or openai");
        println!("   - context.strategy.kind: sliding_window, truncation or summarization");
        println!("   - memory.enabled: long-term memory across conversations");
        println!("   - database.enabled: false keeps everything in memory");
        println!();
        Ok(())
    }
}
