fn main() -> anyhow::Result<()> {
    posecoach_lib::run()
}
