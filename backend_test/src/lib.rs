use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that any database is dropped regardless of how the test terminates.
///
/// By default the test runs against a fresh in-memory store. With
/// `#[backend_test(mongodb)]` it runs against a throwaway database on the
/// server named by `ROCKET_DB_URI`; such tests are ignored unless requested
/// with `--ignored`.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`crate::Voting`] and [`crate::clock::ManualClock`], plus
/// [`crate::store::MongoStore`] and [`mongodb::Database`] for `mongodb` tests.
/// The client, the `Voting` and the clock all share the same state.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    let use_mongodb = match parse_macro_input!(args as Option<Ident>) {
        None => false,
        Some(arg) if arg == "mongodb" => true,
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected no argument or `mongodb`")
                .into_compile_error()
                .into();
        }
    };

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(&item_fn.sig, use_mongodb) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let (maybe_ignore, make_store) = if use_mongodb {
        (
            quote! { #[ignore = "needs a MongoDB server at ROCKET_DB_URI"] },
            quote! {
                let db_uri = std::env::var("ROCKET_DB_URI")
                    .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
                let mongo_store = crate::store::MongoStore::connect(
                    &db_uri,
                    &crate::config::get_database_name(),
                )
                .await
                .unwrap();
                let db = Some(mongo_store.database().clone());
                let store: std::sync::Arc<dyn crate::store::Store> =
                    std::sync::Arc::new(mongo_store.clone());
                let mongo_store = Some(mongo_store);
            },
        )
    } else {
        (
            quote! {},
            quote! {
                let db: Option<mongodb::Database> = None;
                let mongo_store: Option<crate::store::MongoStore> = None;
                let store: std::sync::Arc<dyn crate::store::Store> =
                    std::sync::Arc::new(crate::store::MemoryStore::new());
            },
        )
    };

    // Rewrite the test function.
    quote! {
        #[test]
        #maybe_ignore
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::Voting,
                crate::clock::ManualClock,
                Option<crate::store::MongoStore>,
                Option<mongodb::Database>,
            ) {
                // Tests enter the request path, so enable logging.
                log4rs_test_utils::test_logging::init_logging_once_for(["voting_backend"], None, None);

                #make_store
                let clock = crate::clock::ManualClock::default();
                let voting = crate::Voting::new(
                    store,
                    std::sync::Arc::new(clock.clone()),
                    crate::Config::example(),
                );
                let rocket_client =
                    rocket::local::asynchronous::Client::tracked(crate::rocket_for_voting(voting.clone()))
                        .await
                        .unwrap();

                (rocket_client, voting, clock, mongo_store, db)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: Option<mongodb::Database>) {
                if let Some(db) = db {
                    db.drop(None).await.unwrap();
                }
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let (rocket_client, voting, clock, mongo_store, db) = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let state_mutex = std::sync::Mutex::new((rocket_client, voting, clock, mongo_store, db.clone()));
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                #[allow(unused_variables)]
                let (rocket_client, voting, clock, mongo_store, db) = state_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                runtime.block_on(#new_name(#(#test_args),*));
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: &Signature, use_mongodb: bool) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut seen: Vec<String> = vec![];
    let mut args = vec![];

    for input in &sig.inputs {
        let type_ident = match input {
            FnArg::Typed(pat_type) => match (&*pat_type.pat, &*pat_type.ty) {
                (Pat::Ident(_), Type::Path(type_path)) => type_path.path.segments.last().map(|s| s.ident.clone()),
                _ => None,
            },
            FnArg::Receiver(_) => None,
        };
        let Some(type_ident) = type_ident else {
            return Err(unexpected_arg(input));
        };

        let arg = if type_ident == "Client" {
            quote! { rocket_client }
        } else if type_ident == "Voting" {
            quote! { voting }
        } else if type_ident == "ManualClock" {
            quote! { clock }
        } else if type_ident == "MongoStore" && use_mongodb {
            quote! { mongo_store.unwrap() }
        } else if type_ident == "Database" && use_mongodb {
            quote! { db.unwrap() }
        } else if type_ident == "MongoStore" || type_ident == "Database" {
            return Err(syn::Error::new(
                input.span(),
                "Only `#[backend_test(mongodb)]` tests can accept a database",
            ));
        } else {
            return Err(unexpected_arg(input));
        };

        let type_name = type_ident.to_string();
        if seen.contains(&type_name) {
            return Err(syn::Error::new(
                input.span(),
                format!("Test cannot accept more than one `{type_name}`"),
            ));
        }
        seen.push(type_name);
        args.push(arg);
    }

    Ok(args)
}

fn unexpected_arg(input: &FnArg) -> syn::Error {
    syn::Error::new(
        input.span(),
        "Expected one of `Client`, `Voting`, `ManualClock`, `MongoStore` or `Database`",
    )
}
