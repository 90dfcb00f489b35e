use eyre::Result;

fn main() -> Result<()> {
    forge::args::run()
}
