use calc_queue::app;

fn main() -> anyhow::Result<()> {
    app::main()
}
