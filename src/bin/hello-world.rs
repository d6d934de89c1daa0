use flow_compose::{flow, flow_function, Argument, Arguments, FlowArgument, FlowError, FlowFunction};

#[flow_function]
fn read_name() -> Result<String, FlowError> {
    let mut name = String::new();
    println!("Hello, what is your name?");
    std::io::stdin()
        .read_line(&mut name)
        .map_err(FlowError::failed)?;
    name.truncate(name.trim_end().len());
    Ok(name)
}

#[flow_function(cached)]
async fn greeting(punctuation: FlowArgument<char>) -> Result<String, FlowError> {
    Ok(format!("Welcome{}", punctuation.value().await?))
}

#[flow_function]
async fn welcome(
    greeting: FlowFunction<String>,
    name: FlowFunction<String>,
) -> Result<String, FlowError> {
    Ok(format!("{} {}", greeting.call().await?, name.call().await?))
}

#[flow(
    greeting = greeting(),
    name = read_name(),
    welcome = welcome(),
    punctuation = Argument::with_default('!'),
)]
async fn hello_world(welcome: FlowFunction<String>) -> Result<String, FlowError> {
    welcome.call().await
}

#[tokio::main]
async fn main() -> Result<(), FlowError> {
    let welcome: String = hello_world().call(Arguments::new()).await?;
    println!("{}", welcome);
    Ok(())
}
