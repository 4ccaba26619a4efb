use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    number_pool::apps::run_query_numbers(std::env::args().skip(1))
}
