use surge::error::AppResult;

fn main() -> AppResult<()> {
    surge::entry::run()
}
