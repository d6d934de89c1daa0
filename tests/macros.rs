use std::sync::atomic::{AtomicUsize, Ordering};

use flow_compose::{
    flow, flow_function, Argument, Arguments, FlowArgument, FlowError, FlowFunction, Owner,
};

mod laziness {
    use super::*;

    static GREETING_CALLS: AtomicUsize = AtomicUsize::new(0);

    #[flow_function]
    async fn greeting_hello_world() -> String {
        GREETING_CALLS.fetch_add(1, Ordering::SeqCst);
        String::from("Hello, World!")
    }

    #[flow(greeting = greeting_hello_world())]
    async fn skip_greeting(greeting: FlowFunction<String>) -> String {
        drop(greeting);
        String::from("skipped")
    }

    #[tokio::test]
    async fn uninvoked_dependency_never_runs() {
        let result: String = skip_greeting().call(Arguments::new()).await.unwrap();
        assert_eq!(result, "skipped");
        assert_eq!(GREETING_CALLS.load(Ordering::SeqCst), 0);
    }
}

mod fingerprints {
    use super::*;

    static SAME_CALLS: AtomicUsize = AtomicUsize::new(0);
    static DISTINCT_CALLS: AtomicUsize = AtomicUsize::new(0);
    static DEFAULTED_CALLS: AtomicUsize = AtomicUsize::new(0);

    #[flow_function(cached)]
    async fn greeting_same(index: i32) -> String {
        SAME_CALLS.fetch_add(1, Ordering::SeqCst);
        format!("Hello World! - {}", index)
    }

    #[flow_function(cached)]
    async fn greeting_distinct(index: i32) -> String {
        DISTINCT_CALLS.fetch_add(1, Ordering::SeqCst);
        format!("Hello World! - {}", index)
    }

    #[flow_function(cached)]
    async fn greeting_defaulted(index: i32, #[default(13)] index2: i32) -> String {
        DEFAULTED_CALLS.fetch_add(1, Ordering::SeqCst);
        format!("Hello World! - {} {}", index, index2)
    }

    #[flow(greeting = greeting_same())]
    async fn positional_then_named(
        greeting: FlowFunction<String>,
    ) -> Result<(String, String), FlowError> {
        let positional = greeting.call_with(Arguments::new().arg(11_i32)).await?;
        let named = greeting.call_with(Arguments::new().named("index", 11_i32)).await?;
        Ok((positional, named))
    }

    #[flow(greeting = greeting_distinct())]
    async fn two_indices(greeting: FlowFunction<String>) -> Result<(String, String), FlowError> {
        let eleven = greeting.call_with(Arguments::new().named("index", 11_i32)).await?;
        let thirteen = greeting.call_with(Arguments::new().arg(13_i32)).await?;
        Ok((eleven, thirteen))
    }

    #[flow(greeting = greeting_defaulted())]
    async fn explicit_default(
        greeting: FlowFunction<String>,
    ) -> Result<(String, String), FlowError> {
        let implicit = greeting.call_with(Arguments::new().arg(11_i32)).await?;
        let explicit = greeting.call_with(Arguments::new().arg(11_i32).arg(13_i32)).await?;
        Ok((implicit, explicit))
    }

    #[tokio::test]
    async fn positional_and_named_hit_the_same_entry() {
        let (positional, named): (String, String) =
            positional_then_named().call(Arguments::new()).await.unwrap();
        assert_eq!(positional, "Hello World! - 11");
        assert_eq!(positional, named);
        assert_eq!(SAME_CALLS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_values_run_separately() {
        let (eleven, thirteen): (String, String) =
            two_indices().call(Arguments::new()).await.unwrap();
        assert_eq!(eleven, "Hello World! - 11");
        assert_eq!(thirteen, "Hello World! - 13");
        assert_eq!(DISTINCT_CALLS.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn defaults_count_as_passed() {
        let (implicit, explicit): (String, String) =
            explicit_default().call(Arguments::new()).await.unwrap();
        assert_eq!(implicit, "Hello World! - 11 13");
        assert_eq!(implicit, explicit);
        assert_eq!(DEFAULTED_CALLS.load(Ordering::SeqCst), 1);
    }
}

mod run_scope {
    use super::*;

    static SEQUENTIAL_CALLS: AtomicUsize = AtomicUsize::new(0);
    static CONCURRENT_CALLS: AtomicUsize = AtomicUsize::new(0);

    #[flow_function(cached)]
    async fn greeting_sequential() -> String {
        SEQUENTIAL_CALLS.fetch_add(1, Ordering::SeqCst);
        String::from("Hello, World!")
    }

    #[flow_function(cached)]
    async fn greeting_concurrent() -> String {
        CONCURRENT_CALLS.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        String::from("Hello, World!")
    }

    #[flow(greeting = greeting_sequential())]
    async fn greet_twice(greeting: FlowFunction<String>) -> Result<String, FlowError> {
        Ok(format!("{} {}", greeting.call().await?, greeting.call().await?))
    }

    #[flow(greeting = greeting_concurrent())]
    async fn greet_concurrently(greeting: FlowFunction<String>) -> Result<String, FlowError> {
        let (first, second) = tokio::join!(greeting.call(), greeting.call());
        Ok(format!("{} {}", first?, second?))
    }

    #[tokio::test]
    async fn each_top_level_invocation_starts_empty() {
        for _ in 0..2 {
            let greeting: String = greet_twice().call(Arguments::new()).await.unwrap();
            assert_eq!(greeting, "Hello, World! Hello, World!");
        }
        assert_eq!(SEQUENTIAL_CALLS.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_invocations_do_not_share_results() {
        let flow = greet_concurrently();
        let (first, second) = tokio::join!(
            flow.call::<String>(Arguments::new()),
            flow.call::<String>(Arguments::new()),
        );
        assert_eq!(first.unwrap(), "Hello, World! Hello, World!");
        assert_eq!(second.unwrap(), "Hello, World! Hello, World!");
        // Within each run both calls may miss before either stores its result.
        let calls = CONCURRENT_CALLS.load(Ordering::SeqCst);
        assert!((2..=4).contains(&calls));
    }
}

mod missing {
    use super::*;

    static BODY_CALLS: AtomicUsize = AtomicUsize::new(0);

    #[flow]
    async fn unconfigured(greeting: FlowFunction<String>) -> Result<String, FlowError> {
        BODY_CALLS.fetch_add(1, Ordering::SeqCst);
        greeting.call().await
    }

    #[flow_function]
    async fn greet_user(
        greeting: FlowFunction<String>,
        user: FlowArgument<String>,
    ) -> Result<String, FlowError> {
        Ok(format!("{} {}", greeting.call().await?, user.value().await?))
    }

    #[flow(greet = greet_user())]
    async fn half_configured(greet: FlowFunction<String>) -> Result<String, FlowError> {
        greet.call().await
    }

    #[tokio::test]
    async fn unresolvable_dependency_fails_before_the_body() {
        let error = unconfigured().invoke(Arguments::new()).await.unwrap_err();
        assert_eq!(
            error,
            FlowError::MissingDependencies {
                owner: Owner::Flow(String::from("unconfigured")),
                names: vec![String::from("greeting")],
            }
        );
        assert_eq!(
            error.to_string(),
            "`greeting` dependency is required by the flow `unconfigured` \
             but is missing in the flow context."
        );
        assert_eq!(BODY_CALLS.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn flow_functions_name_everything_missing() {
        let error = half_configured().invoke(Arguments::new()).await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "`greeting`, `user` dependencies are required by `greet_user` \
             but are missing in the flow context."
        );
    }
}

mod precedence {
    use super::*;

    #[flow_function]
    async fn greeting_default() -> String {
        String::from("Hello from the default")
    }

    #[flow_function]
    async fn greeting_configured() -> String {
        String::from("Hello from the configuration")
    }

    #[flow_function]
    async fn greeting_override() -> String {
        String::from("Hello from the caller")
    }

    #[flow]
    async fn defaulted(
        #[default(greeting_default())] greeting: FlowFunction<String>,
    ) -> Result<String, FlowError> {
        greeting.call().await
    }

    #[flow(greeting = greeting_configured())]
    async fn configured(
        #[default(greeting_default())] greeting: FlowFunction<String>,
    ) -> Result<String, FlowError> {
        greeting.call().await
    }

    #[tokio::test]
    async fn default_applies_when_nothing_else_does() {
        let greeting: String = defaulted().call(Arguments::new()).await.unwrap();
        assert_eq!(greeting, "Hello from the default");
    }

    #[tokio::test]
    async fn configuration_beats_default() {
        let greeting: String = configured().call(Arguments::new()).await.unwrap();
        assert_eq!(greeting, "Hello from the configuration");
    }

    #[tokio::test]
    async fn call_time_value_beats_configuration() {
        let greeting: String = configured()
            .call(Arguments::new().named("greeting", String::from("Hello from a value")))
            .await
            .unwrap();
        assert_eq!(greeting, "Hello from a value");

        let greeting: String = configured()
            .call(Arguments::new().named_dependency("greeting", greeting_override()))
            .await
            .unwrap();
        assert_eq!(greeting, "Hello from the caller");
    }

    #[tokio::test]
    async fn call_time_value_must_match_the_dependency_type() {
        let error = configured()
            .invoke(Arguments::new().named("greeting", 11_i32))
            .await
            .unwrap_err();
        assert!(matches!(error, FlowError::TypeMismatch { .. }));
    }
}

mod composition {
    use super::*;

    #[flow_function]
    async fn greeting_hello_world() -> String {
        String::from("Hello, World!")
    }

    #[flow(greeting = greeting_hello_world())]
    async fn flow_c(greeting: FlowFunction<String>) -> Result<String, FlowError> {
        greeting.call().await
    }

    #[flow(next = flow_c())]
    async fn flow_b(next: FlowFunction<String>) -> Result<String, FlowError> {
        next.call().await
    }

    #[flow(next = flow_b())]
    async fn flow_a(next: FlowFunction<String>) -> Result<String, FlowError> {
        next.call().await
    }

    #[tokio::test]
    async fn three_flow_chain_returns_the_deepest_result() {
        let greeting: String = flow_a().call(Arguments::new()).await.unwrap();
        assert_eq!(greeting, "Hello, World!");
    }
}

mod nested_cached_flow {
    use super::*;

    static INNER_CALLS: AtomicUsize = AtomicUsize::new(0);

    #[flow_function]
    async fn greeting_hello_world() -> String {
        String::from("Hello, World!")
    }

    #[flow(cached, greeting = greeting_hello_world())]
    async fn inner(index: i32, greeting: FlowFunction<String>) -> Result<String, FlowError> {
        INNER_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} - {}", greeting.call().await?, index))
    }

    #[flow(inner = inner())]
    async fn outer(inner: FlowFunction<String>) -> Result<Vec<String>, FlowError> {
        let mut greetings = Vec::new();
        for index in [11_i32, 11, 13] {
            greetings.push(inner.call_with(Arguments::new().arg(index)).await?);
        }
        Ok(greetings)
    }

    #[tokio::test]
    async fn nested_flow_results_are_memoized_per_arguments() {
        let greetings: Vec<String> = outer().call(Arguments::new()).await.unwrap();
        assert_eq!(
            greetings,
            vec![
                "Hello, World! - 11",
                "Hello, World! - 11",
                "Hello, World! - 13",
            ]
        );
        assert_eq!(INNER_CALLS.load(Ordering::SeqCst), 2);
    }
}

mod nested_contexts {
    use super::*;

    static SHOUT_CALLS: AtomicUsize = AtomicUsize::new(0);

    #[flow_function]
    async fn greeting_hello() -> String {
        String::from("Hello")
    }

    #[flow_function]
    async fn greeting_hi() -> String {
        String::from("Hi")
    }

    #[flow_function(cached)]
    async fn shout(greeting: FlowFunction<String>) -> Result<String, FlowError> {
        SHOUT_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(greeting.call().await?.to_uppercase())
    }

    #[flow(greeting = greeting_hi(), shout = shout())]
    async fn inner(shout: FlowFunction<String>) -> Result<String, FlowError> {
        shout.call().await
    }

    #[flow(greeting = greeting_hello(), shout = shout(), inner = inner())]
    async fn outer(
        shout: FlowFunction<String>,
        inner: FlowFunction<String>,
    ) -> Result<String, FlowError> {
        let first = shout.call().await?;
        let second = shout.call().await?;
        Ok(format!("{} {} / {}", first, second, inner.call().await?))
    }

    #[tokio::test]
    async fn cached_results_stay_within_their_flow_context() {
        let greeting: String = outer().call(Arguments::new()).await.unwrap();
        assert_eq!(greeting, "HELLO HELLO / HI");
        assert_eq!(SHOUT_CALLS.load(Ordering::SeqCst), 2);
    }
}

mod leaf_arguments {
    use super::*;

    #[flow_function]
    async fn greet_user(
        user: FlowArgument<String>,
        punctuation: FlowArgument<char>,
    ) -> Result<String, FlowError> {
        Ok(format!("Hello, {}{}", user.value().await?, punctuation.value().await?))
    }

    #[flow(
        greet = greet_user(),
        user = Argument::new::<String>(),
        punctuation = Argument::with_default('!'),
    )]
    async fn hello_user(index: i32, greet: FlowFunction<String>) -> Result<String, FlowError> {
        Ok(format!("{} - {}", greet.call().await?, index))
    }

    #[flow(greet = greet_user(), punctuation = Argument::with_default('?'))]
    async fn hello_declared(
        #[default(Argument::with_default(String::from("World")))] user: FlowArgument<String>,
        greet: FlowFunction<String>,
    ) -> Result<String, FlowError> {
        Ok(format!("{} ({})", greet.call().await?, user.value().await?))
    }

    #[test]
    fn auxiliary_arguments_join_the_public_signature() {
        let flow = hello_user();
        let public: Vec<&str> = flow
            .public_parameters()
            .iter()
            .map(|parameter| parameter.name())
            .collect();
        assert_eq!(public, vec!["user", "index", "punctuation"]);
    }

    #[tokio::test]
    async fn arguments_bind_positionally_or_by_name() {
        let greeting: String = hello_user()
            .call(Arguments::new().arg(String::from("Ferris")).arg(11_i32))
            .await
            .unwrap();
        assert_eq!(greeting, "Hello, Ferris! - 11");

        let greeting: String = hello_user()
            .call(
                Arguments::new()
                    .named("index", 13_i32)
                    .named("user", String::from("Ferris"))
                    .named("punctuation", '.'),
            )
            .await
            .unwrap();
        assert_eq!(greeting, "Hello, Ferris. - 13");
    }

    #[tokio::test]
    async fn unvalued_argument_is_missing() {
        let error = hello_user()
            .invoke(Arguments::new().named("index", 11_i32))
            .await
            .unwrap_err();
        assert_eq!(
            error,
            FlowError::MissingDependencies {
                owner: Owner::Flow(String::from("hello_user")),
                names: vec![String::from("user")],
            }
        );
    }

    #[tokio::test]
    async fn declared_argument_defaults_can_be_overridden() {
        let greeting: String = hello_declared().call(Arguments::new()).await.unwrap();
        assert_eq!(greeting, "Hello, World? (World)");

        let greeting: String = hello_declared()
            .call(Arguments::new().arg(String::from("Ferris")))
            .await
            .unwrap();
        assert_eq!(greeting, "Hello, Ferris? (Ferris)");
    }
}

mod blocking {
    use super::*;

    #[flow_function]
    async fn greeting_hello_world() -> String {
        String::from("Hello, World!")
    }

    #[flow_function]
    fn shout(greeting: FlowFunction<String>) -> Result<String, FlowError> {
        Ok(greeting.blocking_call()?.to_uppercase())
    }

    #[flow(greeting = greeting_hello_world(), shout = shout())]
    async fn hello_world(shout: FlowFunction<String>) -> Result<String, FlowError> {
        shout.call().await
    }

    #[flow_function]
    async fn impatient(greeting: FlowFunction<String>) -> Result<String, FlowError> {
        greeting.blocking_call()
    }

    #[flow(greeting = greeting_hello_world(), impatient = impatient())]
    async fn hello_impatient(impatient: FlowFunction<String>) -> Result<String, FlowError> {
        impatient.call().await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_functions_run_on_the_blocking_pool() {
        let greeting: String = hello_world().call(Arguments::new()).await.unwrap();
        assert_eq!(greeting, "HELLO, WORLD!");
    }

    #[tokio::test]
    async fn blocking_functions_run_on_a_current_thread_runtime() {
        let greeting: String = hello_world().call(Arguments::new()).await.unwrap();
        assert_eq!(greeting, "HELLO, WORLD!");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn async_bodies_may_block_on_a_multi_thread_runtime() {
        let greeting: String = hello_impatient().call(Arguments::new()).await.unwrap();
        assert_eq!(greeting, "Hello, World!");
    }

    #[tokio::test]
    async fn async_bodies_cannot_block_a_current_thread_runtime() {
        let error = hello_impatient().invoke(Arguments::new()).await.unwrap_err();
        assert_eq!(
            error,
            FlowError::BlockedRuntime {
                function: String::from("greeting"),
            }
        );
    }

    #[test]
    fn blocking_outside_a_runtime_is_an_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let greeting = runtime.block_on(async {
            let flow = flow_compose::declare_flow("hello_world")
                .configure("greeting", greeting_hello_world())
                .build(|call: flow_compose::Call| async move {
                    call.dependency::<String>("greeting")
                })
                .unwrap();
            flow.call::<FlowFunction<String>>(Arguments::new()).await.unwrap()
        });
        drop(runtime);
        assert_eq!(
            greeting.blocking_call().unwrap_err(),
            FlowError::NoRuntime {
                function: String::from("greeting"),
            }
        );
    }
}
