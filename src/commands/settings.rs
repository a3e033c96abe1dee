use anyhow::Result;
use chrono::Local;

use crate::{
    cli::{ScannerParams, SettingsCommand, ShopParams},
    receipt::render_test_page,
    settings::ScannerSettings,
};

use super::{write_output, AppContext};

pub fn run(ctx: &AppContext, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            let shop = ctx.settings.shop_profile();
            let scanner = ctx.settings.scanner();
            println!("Settings file:      {}", ctx.settings.path().display());
            println!("Shop name:          {}", shop.shop_name);
            println!("Address:            {}", shop.address);
            println!("Phone:              {}", shop.phone);
            println!("Receipt footer:     {}", shop.footer_text);
            println!("Low stock at:       {}", ctx.settings.low_stock_threshold());
            println!(
                "Scan folder:        {}",
                scanner.watcher_config(&ctx.data_dir).watch_dir.display()
            );
            println!("Marker keywords:    {}", scanner.markers.join(", "));
            println!("Marker extension:   {}", scanner.extension);
            Ok(())
        }
        SettingsCommand::Shop(params) => update_shop(ctx, params),
        SettingsCommand::Scanner(params) => {
            let scanner = apply_scanner_params(ctx.settings.scanner(), params);
            ctx.settings.update_scanner(scanner)?;
            println!(
                "Scanner settings saved; watching {}",
                ctx.watcher_config()?.watch_dir.display()
            );
            Ok(())
        }
        SettingsCommand::Threshold { value } => {
            ctx.settings.update_low_stock_threshold(value)?;
            println!("Low stock threshold set to {value}");
            Ok(())
        }
        SettingsCommand::TestPage { output } => {
            let text = render_test_page(&ctx.settings.shop_profile(), Local::now());
            write_output(&text, output.as_deref())
        }
    }
}

fn update_shop(ctx: &AppContext, params: ShopParams) -> Result<()> {
    let mut shop = ctx.settings.shop_profile();
    if let Some(name) = params.name {
        shop.shop_name = name;
    }
    if let Some(address) = params.address {
        shop.address = address;
    }
    if let Some(phone) = params.phone {
        shop.phone = phone;
    }
    if let Some(footer) = params.footer {
        shop.footer_text = footer;
    }

    ctx.settings.update_shop_profile(shop)?;
    println!("Shop profile saved");
    Ok(())
}

fn apply_scanner_params(mut scanner: ScannerSettings, params: ScannerParams) -> ScannerSettings {
    if let Some(dir) = params.dir {
        scanner.watch_dir = dir;
    }
    if let Some(markers) = params.markers {
        scanner.markers = markers
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
    }
    if let Some(extension) = params.extension {
        scanner.extension = extension.trim().to_string();
    }
    if let Some(poll_ms) = params.poll_ms {
        scanner.poll_interval_ms = poll_ms;
    }
    if let Some(settle_ms) = params.settle_ms {
        scanner.settle_delay_ms = settle_ms;
    }
    scanner
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn scanner_params_only_touch_given_fields() {
        let params = ScannerParams {
            dir: None,
            markers: Some(vec![" code ".into(), String::new()]),
            extension: Some(".scan".into()),
            poll_ms: None,
            settle_ms: Some(50),
        };
        let scanner = apply_scanner_params(ScannerSettings::default(), params);

        assert_eq!(scanner.watch_dir, PathBuf::from("scans"));
        assert_eq!(scanner.markers, vec!["code".to_string()]);
        assert_eq!(scanner.extension, ".scan");
        assert_eq!(scanner.settle_delay_ms, 50);
        assert_eq!(
            scanner.poll_interval_ms,
            ScannerSettings::default().poll_interval_ms
        );
    }
}
