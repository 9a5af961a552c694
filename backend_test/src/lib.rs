use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one running against a
/// fresh in-memory store, injecting dependencies and optionally logging in.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] and
/// `crate::store::Store`. Pass `judge` to log the client in as the bootstrap
/// judge, or `student` to create and log in a 10th grade student.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the arguments to inject and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Log in the client as judge/student if needed.
    let maybe_login = match parse_macro_input!(args as Option<Ident>) {
        None => quote! {},
        Some(arg) if arg == "judge" => quote! {
            let credentials = crate::model::api::user::LoginCredentials {
                username: "judge1".to_string(),
                password: "juez123".to_string(),
            };
            let response = rocket_client
                .post(uri!("/api", crate::api::auth::login))
                .header(rocket::http::ContentType::JSON)
                .body(rocket::serde::json::json!(credentials).to_string())
                .dispatch()
                .await;
            assert_eq!(response.status(), rocket::http::Status::Ok, "judge login failed");
        },
        Some(arg) if arg == "student" => quote! {
            let spec = crate::model::api::user::UserSpec::example_student("maria", 10);
            store
                .insert_user(spec.clone().try_into().unwrap())
                .await
                .unwrap();

            let credentials = crate::model::api::user::LoginCredentials::from_spec(&spec);
            let response = rocket_client
                .post(uri!("/api", crate::api::auth::login))
                .header(rocket::http::ContentType::JSON)
                .body(rocket::serde::json::json!(credentials).to_string())
                .dispatch()
                .await;
            assert_eq!(response.status(), rocket::http::Status::Ok, "student login failed");
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `judge` or `student`")
                .into_compile_error()
                .into();
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (rocket::local::asynchronous::Client, crate::store::Store) {
                let store: crate::store::Store =
                    std::sync::Arc::new(crate::store::memory::MemoryStore::new());
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_store(store.clone()),
                )
                .await
                .unwrap();

                {
                    #maybe_login
                }

                (rocket_client, store)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let (rocket_client, store) = setup().await;
                let _ = &store;
                #new_name(#(#test_args),*).await
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_store = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // The last path segment names the type whether or not it is qualified.
                let type_ident = type_path.path.segments.last().map(|s| &s.ident);
                if type_ident.map_or(false, |ident| ident == "Client") {
                    if has_client {
                        return Err(syn::Error::new(
                            input.span(),
                            "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                        ));
                    }
                    has_client = true;
                    args.push(quote! { rocket_client });
                    continue;
                } else if type_ident.map_or(false, |ident| ident == "Store") {
                    if has_store {
                        return Err(syn::Error::new(
                            input.span(),
                            "Test cannot accept more than one `Store`",
                        ));
                    }
                    has_store = true;
                    args.push(quote! { store.clone() });
                    continue;
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `store_ident: Store`",
        ));
    }

    Ok(args)
}
