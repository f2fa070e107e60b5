//! Standalone sandbox worker. Equivalent to `flowctl sandbox-worker`.

fn main() -> std::io::Result<()> {
    sandbox::worker::serve_stdio()
}
