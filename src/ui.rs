use crate::filter::ALL_LABEL;
use crate::models::DateRange;

pub fn render_index(range: &DateRange) -> String {
    INDEX_HTML
        .replace("{{FROM}}", &range.from.format("%Y-%m-%d").to_string())
        .replace("{{TO}}", &range.to.format("%Y-%m-%d").to_string())
        .replace("{{ALL}}", ALL_LABEL)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>BI Subscriptions</title>
  <style>
    @import url('https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700&display=swap');

    :root {
      --bg: #fffdf7;
      --side: #f5f0e8;
      --card: #ffffff;
      --border: rgba(0, 0, 0, 0.06);
      --ink: #2d2a26;
      --ink-2: #8a8378;
      --accent: #6c5ce7;
      --accent-2: #00b894;
      --accent-3: #e17055;
      --accent-4: #0984e3;
      --radius: 16px;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Inter", -apple-system, sans-serif;
      display: grid;
      grid-template-columns: 280px 1fr;
    }

    aside {
      background: var(--side);
      padding: 28px 22px;
      display: grid;
      align-content: start;
      gap: 14px;
    }

    aside h2 {
      margin: 0 0 8px;
      font-size: 1.25rem;
    }

    .section {
      margin-top: 10px;
      font-size: 0.75rem;
      text-transform: uppercase;
      letter-spacing: 0.12em;
      color: var(--ink-2);
    }

    label {
      display: grid;
      gap: 4px;
      font-size: 0.85rem;
      color: var(--ink-2);
    }

    input, select, button {
      font: inherit;
      padding: 8px 10px;
      border-radius: 10px;
      border: 1px solid var(--border);
      background: white;
      color: var(--ink);
    }

    button {
      cursor: pointer;
      background: var(--accent);
      color: white;
      border: none;
      font-weight: 600;
    }

    main {
      padding: 32px;
      display: grid;
      gap: 24px;
      align-content: start;
    }

    h1 {
      margin: 0;
      font-size: 2rem;
    }

    .subtitle {
      margin: 4px 0 0;
      color: var(--ink-2);
    }

    .banner {
      padding: 14px 18px;
      border-radius: var(--radius);
      display: none;
    }

    .banner[data-type="error"] {
      display: block;
      background: #fdecea;
      color: #c63b2b;
    }

    .banner[data-type="warning"] {
      display: block;
      background: #fff6e0;
      color: #8a6100;
    }

    .kpis {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
      gap: 16px;
    }

    .kpi, .chart, .table-wrap {
      background: var(--card);
      border: 1px solid var(--border);
      border-radius: var(--radius);
      padding: 18px;
    }

    .kpi .label {
      font-size: 0.8rem;
      text-transform: uppercase;
      letter-spacing: 0.1em;
      color: var(--ink-2);
    }

    .kpi .value {
      font-size: 1.7rem;
      font-weight: 600;
      margin-top: 6px;
    }

    .charts {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(360px, 1fr));
      gap: 20px;
    }

    .chart h3 {
      margin: 0 0 12px;
      font-size: 1.05rem;
    }

    .bar {
      display: grid;
      grid-template-columns: 140px 1fr 70px;
      align-items: center;
      gap: 8px;
      font-size: 0.85rem;
      margin-bottom: 6px;
    }

    .bar .name {
      overflow: hidden;
      text-overflow: ellipsis;
      white-space: nowrap;
    }

    .bar .track {
      background: rgba(0, 0, 0, 0.04);
      border-radius: 8px;
      height: 14px;
    }

    .bar .fill {
      background: var(--accent);
      border-radius: 8px;
      height: 14px;
    }

    .bar .num {
      text-align: right;
      color: var(--ink-2);
    }

    .no-data {
      padding: 48px 0;
      text-align: center;
      color: var(--ink-2);
      font-size: 0.92rem;
    }

    table {
      width: 100%;
      border-collapse: collapse;
      font-size: 0.82rem;
    }

    th, td {
      padding: 6px 8px;
      border-bottom: 1px solid var(--border);
      text-align: left;
      white-space: nowrap;
    }

    .table-wrap {
      overflow: auto;
      max-height: 420px;
    }

    @media (max-width: 900px) {
      body {
        grid-template-columns: 1fr;
      }
    }
  </style>
</head>
<body>
  <aside>
    <h2>BI Subscriptions</h2>
    <div class="section">Period</div>
    <label>From <input type="date" id="from" value="{{FROM}}" /></label>
    <label>To <input type="date" id="to" value="{{TO}}" /></label>
    <button type="button" id="refresh">Refresh</button>
    <div class="section">Filters</div>
    <label>City <select id="city" data-param="city" data-option="cities"></select></label>
    <label>Tariff <select id="tariff" data-param="tariff" data-option="tariffs"></select></label>
    <label>Subscription type <select id="subscription_type" data-param="subscription_type" data-option="subscription_types"></select></label>
    <label id="manager-label">Manager <select id="manager" data-param="manager" data-option="managers"></select></label>
    <label>Billing <select id="billing_period" data-param="billing_period" data-option="billing_periods"></select></label>
  </aside>

  <main>
    <header>
      <h1>Subscriptions</h1>
      <p class="subtitle" id="subtitle"></p>
    </header>

    <div class="banner" id="banner"></div>

    <section class="kpis">
      <div class="kpi"><div class="label">Total subscriptions</div><div class="value" id="kpi-total">--</div></div>
      <div class="kpi"><div class="label">Unique subscribers</div><div class="value" id="kpi-unique">--</div></div>
      <div class="kpi"><div class="label">Total amount</div><div class="value" id="kpi-amount">--</div></div>
      <div class="kpi"><div class="label">Average bonus</div><div class="value" id="kpi-bonus">--</div></div>
    </section>

    <section class="charts" id="charts"></section>

    <section>
      <h3>Data</h3>
      <div class="table-wrap"><table id="table"></table></div>
    </section>
  </main>

  <script>
    const ALL = '{{ALL}}';
    const selects = Array.from(document.querySelectorAll('select[data-param]'));
    const bannerEl = document.getElementById('banner');
    const chartsEl = document.getElementById('charts');
    const tableEl = document.getElementById('table');

    const PANELS = [
      { title: 'Subscriptions by month', keys: ['by_month'] },
      { title: 'Tariffs', keys: ['by_tariff'] },
      { title: 'Top 15 cities', keys: ['top_cities'] },
      { title: 'Subscription types', keys: ['by_subscription_type'] },
      { title: 'Daily connections', keys: ['daily'] },
      { title: 'Amount by month', keys: ['amount_by_month', 'by_billing_period'] },
      { title: 'Managers', keys: ['top_managers'] },
      { title: 'Bonus (%)', keys: ['bonus_distribution', 'by_weekday'] },
      { title: 'Top 10 subscribers', keys: ['top_subscribers'] }
    ];
    const FALLBACK_TITLES = { by_billing_period: 'Billing periods', by_weekday: 'By weekday' };
    const COLUMNS = [
      'subscriber_id', 'subscriber_name', 'city_id', 'manager_id', 'provider_tariff_name',
      'subscription_type', 'billing_period', 'subscription_connection_time', 'connection_date',
      'disconnection_date', 'quantity', 'amount', 'percent_bonus', 'amount_of_remuneration'
    ];

    const el = (tag, className, text) => {
      const node = document.createElement(tag);
      if (className) node.className = className;
      if (text !== undefined) node.textContent = text;
      return node;
    };

    const setBanner = (message, type) => {
      bannerEl.textContent = message || '';
      bannerEl.dataset.type = message ? type : '';
    };

    const formatNumber = (value, decimals = 0) =>
      Number(value).toLocaleString('en-US', { maximumFractionDigits: decimals });

    const query = () => {
      const params = new URLSearchParams();
      params.set('from', document.getElementById('from').value);
      params.set('to', document.getElementById('to').value);
      selects.forEach((select) => {
        if (select.selectedIndex > 0) {
          params.set(select.dataset.param, select.value);
        }
      });
      return params.toString();
    };

    const fillSelects = (options) => {
      selects.forEach((select) => {
        const values = options[select.dataset.option];
        const current = select.selectedIndex > 0 ? select.value : null;
        select.replaceChildren(el('option', null, ALL));
        (values || []).forEach((value) => {
          const option = el('option', null, value);
          option.value = value;
          select.appendChild(option);
        });
        if (current !== null && (values || []).includes(current)) {
          select.value = current;
        }
      });
      document.getElementById('manager-label').style.display = options.managers ? '' : 'none';
    };

    const renderChart = (title, chart) => {
      const card = el('div', 'chart');
      card.appendChild(el('h3', null, title));
      if (!chart || chart.state === 'no_data') {
        card.appendChild(el('div', 'no-data', chart ? chart.message : 'No data'));
        return card;
      }
      const max = Math.max(...chart.points.map((p) => p.value), 1);
      chart.points.forEach((point) => {
        const bar = el('div', 'bar');
        bar.appendChild(el('span', 'name', point.label));
        const track = el('div', 'track');
        const fill = el('div', 'fill');
        fill.style.width = `${(point.value / max) * 100}%`;
        track.appendChild(fill);
        bar.appendChild(track);
        bar.appendChild(el('span', 'num', formatNumber(point.value)));
        card.appendChild(bar);
      });
      return card;
    };

    const renderCharts = (charts) => {
      chartsEl.replaceChildren();
      PANELS.forEach((panel) => {
        const key = panel.keys.find((k) => charts[k] && charts[k].state === 'series') || panel.keys[0];
        const title = key === panel.keys[0] ? panel.title : FALLBACK_TITLES[key];
        chartsEl.appendChild(renderChart(title, charts[key]));
      });
    };

    const renderKpis = (data) => {
      document.getElementById('kpi-total').textContent = formatNumber(data.kpis.total_subscriptions);
      document.getElementById('kpi-unique').textContent = formatNumber(data.kpis.unique_subscribers);
      document.getElementById('kpi-amount').textContent = formatNumber(data.kpis.total_amount);
      document.getElementById('kpi-bonus').textContent =
        data.kpis.average_bonus === null ? '--' : `${data.kpis.average_bonus.toFixed(1)}%`;
      document.getElementById('subtitle').textContent =
        `${data.range.from} — ${data.range.to} · ${data.filtered_rows} of ${data.total_rows} records`;
    };

    const renderTable = (rows) => {
      const head = el('tr');
      COLUMNS.forEach((column) => head.appendChild(el('th', null, column)));
      tableEl.replaceChildren(head);
      if (!rows.length) {
        const empty = el('td', 'no-data', 'No data');
        empty.colSpan = COLUMNS.length;
        const tr = el('tr');
        tr.appendChild(empty);
        tableEl.appendChild(tr);
        return;
      }
      rows.forEach((row) => {
        const tr = el('tr');
        COLUMNS.forEach((column) => tr.appendChild(el('td', null, row[column] === null ? '' : String(row[column]))));
        tableEl.appendChild(tr);
      });
    };

    const readJson = async (res) => {
      const body = await res.json().catch(() => ({}));
      if (!res.ok) {
        throw new Error(body.error || `Request failed (${res.status})`);
      }
      return body;
    };

    let latest = 0;

    // Only the newest request may touch the page.
    const load = async (seq) => {
      setBanner('Loading...', 'warning');
      let params = query();
      let dashboard = await readJson(await fetch(`/api/dashboard?${params}`));
      if (seq !== latest) return;
      fillSelects(dashboard.options);
      if (query() !== params) {
        params = query();
        dashboard = await readJson(await fetch(`/api/dashboard?${params}`));
        if (seq !== latest) return;
      }
      const records = await readJson(await fetch(`/api/records?${params}`));
      if (seq !== latest) return;
      renderKpis(dashboard);
      renderCharts(dashboard.charts);
      renderTable(records.rows);
      if (dashboard.total_rows === 0) {
        setBanner('No data for the selected period.', 'warning');
      } else {
        setBanner('', '');
      }
    };

    const reload = () => {
      latest += 1;
      const seq = latest;
      return load(seq).catch((err) => {
        if (seq !== latest) return;
        chartsEl.replaceChildren();
        renderTable([]);
        setBanner(`Failed to load data: ${err.message}`, 'error');
      });
    };

    document.getElementById('refresh').addEventListener('click', async () => {
      await fetch('/api/refresh', { method: 'POST' });
      reload();
    });
    document.getElementById('from').addEventListener('change', reload);
    document.getElementById('to').addEventListener('change', reload);
    selects.forEach((select) => select.addEventListener('change', reload));

    reload();
  </script>
</body>
</html>
"#;
