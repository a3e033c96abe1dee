//! Interactive register: the one task that owns the order session.
//!
//! Typed lines and scanned codes are merged in a single `select!` loop, so the
//! session is never touched from the watcher's poll task.

use std::io::Write as _;

use anyhow::{Context, Result};
use chrono::Local;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};

use crate::{
    db::{Database, OrderId, Payment, PaymentMethod},
    error::PosError,
    money::{format_amount, CURRENCY_SYMBOL},
    receipt::render_receipt,
    register::{LineItemDelta, RegisterController},
    scanner::{CodeWatcher, ScannedCode, WatcherConfig},
};

use super::{orders::load_order, AppContext};

// Set to false to keep register chatter out of the log
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const HELP: &str = "\
Type or scan a barcode to add it. Commands:
  :list                   show the current ticket
  :qty <line> <quantity>  change a line's quantity
  :rm <line>              remove a line
  :pay <method> [ref]     check out (cash, wechat, alipay, card)
  :scan                   turn folder scanning on or off
  :clear                  start over with an empty ticket
  :help                   show this text
  :quit                   leave the register";

#[derive(Debug, PartialEq)]
enum RegisterCommand {
    Empty,
    Code(String),
    List,
    /// `line` is zero-based.
    Quantity { line: usize, quantity: i64 },
    Remove(usize),
    Pay {
        method: PaymentMethod,
        reference: Option<String>,
    },
    ToggleScan,
    Clear,
    Help,
    Quit,
}

fn parse_line_number(arg: Option<&str>) -> Result<usize, PosError> {
    let arg = arg.ok_or_else(|| PosError::invalid("missing line number"))?;
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(PosError::invalid(format!("'{arg}' is not a line number"))),
    }
}

fn parse_command(input: &str) -> Result<RegisterCommand, PosError> {
    let input = input.trim();
    let Some(rest) = input.strip_prefix(':') else {
        return Ok(if input.is_empty() {
            RegisterCommand::Empty
        } else {
            RegisterCommand::Code(input.to_string())
        });
    };

    let mut args = rest.split_whitespace();
    let name = args.next().unwrap_or_default();
    let command = match name {
        "list" | "ls" => RegisterCommand::List,
        "qty" => {
            let line = parse_line_number(args.next())?;
            let raw = args
                .next()
                .ok_or_else(|| PosError::invalid("missing quantity"))?;
            let quantity = raw
                .parse()
                .map_err(|_| PosError::invalid(format!("'{raw}' is not a quantity")))?;
            RegisterCommand::Quantity { line, quantity }
        }
        "rm" => RegisterCommand::Remove(parse_line_number(args.next())?),
        "pay" => {
            let method = args
                .next()
                .ok_or_else(|| PosError::invalid("missing payment method"))?
                .parse()?;
            RegisterCommand::Pay {
                method,
                reference: args.next().map(str::to_string),
            }
        }
        "scan" => RegisterCommand::ToggleScan,
        "clear" => RegisterCommand::Clear,
        "help" | "?" => RegisterCommand::Help,
        "quit" | "q" | "exit" => RegisterCommand::Quit,
        other => return Err(PosError::invalid(format!("unknown command ':{other}'"))),
    };
    Ok(command)
}

enum Input {
    Line(String),
    Scan(ScannedCode),
    Closed,
}

struct RegisterLoop<'a> {
    ctx: &'a AppContext,
    controller: RegisterController<Database>,
    config: WatcherConfig,
    scanner: CodeWatcher,
    scan_tx: UnboundedSender<ScannedCode>,
    scan_rx: UnboundedReceiver<ScannedCode>,
    input: Lines<BufReader<Stdin>>,
}

pub async fn run(ctx: &AppContext) -> Result<()> {
    let config = ctx.watcher_config()?;
    let (scan_tx, scan_rx) = mpsc::unbounded_channel();

    let mut register = RegisterLoop {
        ctx,
        controller: RegisterController::new(ctx.db.clone()),
        scanner: CodeWatcher::new(config.clone()),
        config,
        scan_tx,
        scan_rx,
        input: BufReader::new(tokio::io::stdin()).lines(),
    };
    register.run().await
}

impl RegisterLoop<'_> {
    async fn run(&mut self) -> Result<()> {
        println!("{HELP}\n");
        self.set_scanning(true);

        loop {
            self.prompt();
            match self.next_input().await? {
                Input::Closed => break,
                Input::Scan(scanned) => {
                    println!("[scan] {}", scanned.code);
                    self.add_code(&scanned.code).await;
                }
                Input::Line(line) => match parse_command(&line) {
                    Ok(RegisterCommand::Quit) => break,
                    Ok(command) => self.handle(command).await?,
                    Err(err) => println!("{err}"),
                },
            }
        }

        if !self.controller.session().is_empty() {
            println!(
                "Discarding unfinished ticket with {} line(s)",
                self.controller.lines().len()
            );
        }
        self.scanner.shutdown().await;
        Ok(())
    }

    fn prompt(&self) {
        print!(
            "[{CURRENCY_SYMBOL}{}] > ",
            format_amount(self.controller.total())
        );
        let _ = std::io::stdout().flush();
    }

    async fn next_input(&mut self) -> Result<Input> {
        tokio::select! {
            line = self.input.next_line() => {
                Ok(match line.context("Failed to read from stdin")? {
                    Some(line) => Input::Line(line),
                    None => Input::Closed,
                })
            }
            // The loop keeps a sender alive, so this never yields `None`.
            Some(scanned) = self.scan_rx.recv() => Ok(Input::Scan(scanned)),
        }
    }

    async fn handle(&mut self, command: RegisterCommand) -> Result<()> {
        match command {
            RegisterCommand::Empty | RegisterCommand::Quit => {}
            RegisterCommand::Code(code) => self.add_code(&code).await,
            RegisterCommand::List => self.print_ticket(),
            RegisterCommand::Quantity { line, quantity } => {
                match self.controller.set_quantity(line, quantity) {
                    Ok(()) => self.print_ticket(),
                    Err(err) => println!("{err}"),
                }
            }
            RegisterCommand::Remove(line) => match self.controller.remove_line(line) {
                Some(removed) => println!("Removed {}", removed.display_name),
                None => println!("There is no line {}", line + 1),
            },
            RegisterCommand::Pay { method, reference } => self.pay(method, reference).await?,
            RegisterCommand::ToggleScan => {
                let enable = !self.scanner.is_running();
                self.set_scanning(enable);
            }
            RegisterCommand::Clear => {
                self.controller.clear();
                println!("Ticket cleared");
            }
            RegisterCommand::Help => println!("{HELP}"),
        }
        Ok(())
    }

    fn set_scanning(&mut self, enable: bool) {
        if enable {
            if self.scanner.start(self.scan_tx.clone()) {
                println!("Scanning {}", self.scanner.watch_directory().display());
            }
        } else {
            self.scanner.stop();
            println!("Scanning off");
        }
    }

    async fn add_code(&mut self, code: &str) {
        match self.controller.add_by_code(code).await {
            Ok(LineItemDelta::Added { index, name }) => {
                println!("{}. {name} added", index + 1);
            }
            Ok(LineItemDelta::Incremented {
                index,
                name,
                quantity,
            }) => {
                println!("{}. {name} x{quantity}", index + 1);
            }
            Err(PosError::NotFound(code)) => println!("No product with barcode {code}"),
            Err(err) => {
                log_warn!("lookup of {code} failed: {err}");
                println!("{err}");
            }
        }
    }

    fn print_ticket(&self) {
        let lines = self.controller.lines();
        if lines.is_empty() {
            println!("The ticket is empty");
            return;
        }
        for (index, line) in lines.iter().enumerate() {
            println!(
                "{:>3}. {:<24} {:>4} x {CURRENCY_SYMBOL}{:<8} = {CURRENCY_SYMBOL}{}",
                index + 1,
                line.display_name,
                line.quantity,
                line.unit_price,
                format_amount(line.subtotal())
            );
        }
        println!(
            "     Total: {CURRENCY_SYMBOL}{}",
            format_amount(self.controller.total())
        );
    }

    async fn pay(&mut self, method: PaymentMethod, reference: Option<String>) -> Result<()> {
        let reference = match reference {
            Some(reference) => Some(reference),
            None if method.requires_reference() && !self.controller.session().is_empty() => {
                match self.read_reference(method).await? {
                    Some(reference) => Some(reference),
                    None => {
                        println!("Payment cancelled");
                        return Ok(());
                    }
                }
            }
            None => None,
        };

        match self.controller.checkout(&Payment { method, reference }).await {
            Ok(order_id) => {
                println!("Order {order_id} recorded");
                log_info!("order {order_id} paid by {}", method.as_str());
                self.print_receipt(order_id).await;
                self.warn_low_stock().await;
            }
            Err(err) => println!("{err}"),
        }
        Ok(())
    }

    /// Takes the payment code from a fresh watcher or from stdin, whichever comes first.
    ///
    /// The register's own watcher is paused meanwhile so the code is not rung up
    /// as a product.
    async fn read_reference(&mut self, method: PaymentMethod) -> Result<Option<String>> {
        let resume_scanning = self.scanner.is_running();
        self.scanner.shutdown().await;

        let payment_scanner = CodeWatcher::new(self.config.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        payment_scanner.start(tx);
        println!("Scan or type the {method} code (empty line cancels):");

        let reference = tokio::select! {
            line = self.input.next_line() => {
                line.context("Failed to read from stdin")?
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty())
            }
            scanned = rx.recv() => scanned.map(|scanned| {
                println!("[scan] {}", scanned.code);
                scanned.code
            }),
        };

        payment_scanner.shutdown().await;
        if resume_scanning {
            self.scanner.start(self.scan_tx.clone());
        }
        Ok(reference)
    }

    async fn print_receipt(&self, order_id: OrderId) {
        match load_order(self.ctx, order_id).await {
            Ok((order, items)) => {
                let shop = self.ctx.settings.shop_profile();
                print!("\n{}", render_receipt(&shop, &order, &items, Local::now()));
            }
            Err(err) => log_warn!("could not load order {order_id} for its receipt: {err:#}"),
        }
    }

    async fn warn_low_stock(&self) {
        let threshold = self.ctx.settings.low_stock_threshold();
        match self.controller.low_stock(threshold).await {
            Ok(products) if !products.is_empty() => {
                println!("Low stock:");
                for product in products {
                    println!("  {} ({} left)", product.model, product.stock);
                }
            }
            Ok(_) => {}
            Err(err) => log_warn!("low stock check failed: {err}"),
        }
    }
}
