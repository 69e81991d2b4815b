use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use garbled_int::backend::{clear, garbled, shares, ClientKeyT, ContextT};
use garbled_int::codec::{CallBinding, PartyId, PartyKey};
use garbled_int::lifecycle::{KeyRegistry, Session};
use garbled_int::secint::{arith, cmp};
use garbled_int::value::{Plain, Width};
use rand::Rng;
use tracing::metadata::LevelFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Clear,
    Shares,
    Garbled,
}

/// Onboard two signed integers, run the arithmetic engine over them and
/// reveal the results, including a round trip through storage ciphertexts.
#[derive(Parser)]
struct Args {
    /// Backend to evaluate on
    #[arg(long, value_enum, default_value_t = Backend::Garbled)]
    backend: Backend,

    /// Bit width: 8, 16, 32, 64, 128 or 256
    #[arg(long, default_value_t = 64)]
    width: usize,

    lhs: i128,
    rhs: i128,
}

fn main() -> Result<()> {
    garbled_int::logger::init(LevelFilter::INFO);
    let args = Args::parse();
    let width = Width::from_bits(args.width)
        .ok_or_else(|| anyhow!("unsupported width {}", args.width))?;

    match args.backend {
        Backend::Clear => {
            let (client_key, ctx) = clear::generate();
            run(ctx, client_key, width, args.lhs, args.rhs)
        }
        Backend::Shares => {
            let (client_key, ctx) = shares::generate(rand::rng().random());
            run(ctx, client_key, width, args.lhs, args.rhs)
        }
        Backend::Garbled => {
            let (client_key, ctx) = garbled::generate(rand::rng().random());
            run(ctx, client_key, width, args.lhs, args.rhs)
        }
    }
}

fn run<Ctx, CK>(ctx: Ctx, client_key: CK, width: Width, lhs: i128, rhs: i128) -> Result<()>
where
    Ctx: ContextT,
    CK: ClientKeyT<Bit = Ctx::Bit>,
{
    let caller = PartyId(1);
    let mut rng = rand::rng();
    let mut registry = KeyRegistry::default();
    registry.insert(caller, PartyKey::random(&mut rng));

    let session = Session::new(
        ctx,
        client_key,
        Box::new(registry),
        PartyKey::random(&mut rng),
        CallBinding {
            caller,
            selector: *b"demo",
        },
        rng.random(),
    );

    let a = session.validate(&session.make_ticket(&Plain::from_i128(lhs, width))?)?;
    let b = session.validate(&session.make_ticket(&Plain::from_i128(rhs, width))?)?;
    let ctx = session.context();

    println!("add: {}", session.reveal(&arith::add(ctx, &a, &b)?));
    println!("sub: {}", session.reveal(&arith::sub(ctx, &a, &b)?));
    println!("mul: {}", session.reveal(&arith::mul(ctx, &a, &b)?));
    match arith::div(ctx, &a, &b) {
        Ok(quotient) => println!("div: {}", session.reveal(&quotient)),
        Err(err) => println!("div: {err}"),
    }
    println!("min: {}", session.reveal(&cmp::min(ctx, &a, &b)?));
    println!("lt:  {}", ctx.open(&cmp::lt(ctx, &a, &b)?));

    let stored = session.offboard(&a);
    let back = session.onboard(&stored)?;
    println!("storage round trip: {}", session.reveal(&back));

    Ok(())
}
