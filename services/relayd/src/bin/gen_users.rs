use clap::{App, Arg};
use murmur::logging;
use parley::store::users::UserStore;
use rand::distributions::Uniform;
use rand::prelude::*;

const ALLOWED_CHARS: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

const PASSWORD_LEN: usize = 12;

fn make_password(rng: &mut ThreadRng) -> String {
    rng.sample_iter(Uniform::new(0, ALLOWED_CHARS.len()))
        .take(PASSWORD_LEN)
        .map(|sample| ALLOWED_CHARS[sample])
        .collect()
}

fn main() {
    let matches = App::new("User Seeder")
        .version("1.0")
        .about("Seeds the credential store with generated accounts.")
        .arg(
            Arg::with_name("STORAGE_DIR")
                .help("Directory holding users.dat")
                .required(true),
        )
        .arg(
            Arg::with_name("COUNT")
                .help("Number of accounts to create")
                .required(true),
        )
        .arg(
            Arg::with_name("PREFIX")
                .help("Username prefix, defaults to `user`")
                .required(false),
        )
        .get_matches();

    let storage_dir = matches.value_of("STORAGE_DIR").unwrap();
    let count: usize = matches
        .value_of("COUNT")
        .unwrap()
        .parse()
        .expect("Count must be a valid integer");
    let prefix = matches.value_of("PREFIX").unwrap_or("user");

    let logger = logging::init(logging::Severity::Warning);
    let store = UserStore::open(storage_dir, &logger);

    println!("Credential store currently holds {} entries", store.len());

    let mut rng = thread_rng();
    let mut created = 0;

    for index in 0..count {
        let username = format!("{}{:02}", prefix, index);
        let password = make_password(&mut rng);

        if store.register(&username, &password) {
            println!("{} {}", username, password);
            created += 1;
        } else {
            println!("{} already exists, skipped", username);
        }
    }

    println!("Created {} of {} accounts", created, count);
}
