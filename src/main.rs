fn main() -> anyhow::Result<()> {
    heliotrace::cli_main::main()
}
