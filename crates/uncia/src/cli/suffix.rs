use uncia_archive::suffix::classify;

#[derive(Debug, clap::Args)]
pub struct Suffix {
    /// File name to classify
    name: String,
}

impl Suffix {
    pub fn run(self) -> anyhow::Result<()> {
        let classified = classify(&self.name);
        println!("stem:   {}", classified.stem);
        println!("format: {}", classified.format.unwrap_or("-"));
        println!("filter: {}", classified.filter.unwrap_or("-"));
        Ok(())
    }
}
